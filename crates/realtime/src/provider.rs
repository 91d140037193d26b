//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use anyhow::Result;
use async_trait::async_trait;

/// The `VehicleDocStore` trait defines point lookup/update of persisted
/// vehicle documents by device id. The persistence engine itself lives
/// behind this seam; the engine only ever reads and writes whole documents.
#[async_trait]
pub trait VehicleDocStore: Send + Sync {
    /// Fetch the persisted document for a device, if one exists.
    async fn fetch(&self, device_id: &str) -> Result<Option<Vec<u8>>>;

    /// Store the document for a device, replacing any previous version.
    async fn store(&self, device_id: &str, doc: &[u8]) -> Result<()>;

    /// Remove the document for a device.
    async fn delete(&self, device_id: &str) -> Result<()>;
}
