//! # Buslive
//!
//! The realtime engine behind live bus tracking: vehicle state
//! maintenance, geospatial ETA computation, historical delay analysis, a
//! topic-based broadcast hub and a timer-driven notification scheduler.
//! The surrounding CRUD/API layer, identity, payments and the persistence
//! engine live elsewhere and reach this core through the provider traits
//! in `realtime` and `trends`.

mod api;
mod config;
mod events;
mod orchestrator;

use std::sync::Arc;

use fleet::FleetStore;
use hub::Hub;
use notifier::NotificationScheduler;
use realtime::{Clock, VehicleDocStore};
use trends::{TrendAnalyzer, TripHistoryStore};

pub use crate::api::*;
pub use crate::config::Config;
pub use crate::events::*;
pub use crate::orchestrator::*;

/// The assembled engine. Constructed once at process start with its
/// external collaborators injected; everything downstream receives the
/// shared pieces by reference, so there is no global mutable state to
/// reach around.
pub struct Engine {
    config: Config,
    clock: Arc<dyn Clock>,
    hub: Arc<Hub>,
    fleet: Arc<FleetStore>,
    scheduler: Arc<NotificationScheduler>,
    analyzer: TrendAnalyzer,
    orchestrator: TrackingOrchestrator,
}

impl Engine {
    #[must_use]
    pub fn new(
        config: Config, docs: Arc<dyn VehicleDocStore>, history: Arc<dyn TripHistoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hub = Arc::new(Hub::new());
        let fleet = Arc::new(FleetStore::new(
            Arc::clone(&clock),
            config.route_history_cap,
            config.default_capacity,
        ));
        let scheduler = Arc::new(NotificationScheduler::new(
            Arc::clone(&hub),
            Arc::clone(&clock),
            config.scheduler(),
        ));
        let analyzer =
            TrendAnalyzer::new(history, config.history_query_timeout, config.history_window_limit);
        let orchestrator = TrackingOrchestrator::new(
            Arc::clone(&fleet),
            Arc::clone(&hub),
            Arc::clone(&scheduler),
            docs,
            Arc::clone(&clock),
            config.history_query_timeout,
        );

        Self { config, clock, hub, fleet, scheduler, analyzer, orchestrator }
    }

    /// The broadcast hub, for opening subscriber connections.
    #[must_use]
    pub const fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// The notification scheduler, for operational introspection.
    #[must_use]
    pub const fn scheduler(&self) -> &Arc<NotificationScheduler> {
        &self.scheduler
    }

    /// Drain every outstanding timer. Call on process shutdown; nothing
    /// fires afterwards.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish_non_exhaustive()
    }
}
