//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::record::TripRecord;

/// Windowed query against the historical trip store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub route_id: String,
    /// Restrict to trips on this local day of week (0 = Sunday).
    pub day_of_week: Option<u8>,
    /// Restrict to trips departing in this local hour.
    pub hour_of_day: Option<u8>,
    /// Maximum records to return, most recent first.
    pub limit: usize,
}

impl HistoryQuery {
    #[must_use]
    pub fn for_route(route_id: impl Into<String>, limit: usize) -> Self {
        Self { route_id: route_id.into(), day_of_week: None, hour_of_day: None, limit }
    }
}

/// The `TripHistoryStore` trait defines the behavior for reading and
/// appending historical trip records. Queries are the only operation in the
/// engine allowed to block on external storage and are always wrapped in a
/// timeout by the caller.
#[async_trait]
pub trait TripHistoryStore: Send + Sync {
    /// Fetch a bounded window of records, most recent first.
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<TripRecord>>;

    /// Append a completed trip record.
    async fn append(&self, record: &TripRecord) -> Result<()>;
}
