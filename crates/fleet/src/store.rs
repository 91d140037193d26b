use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use realtime::{Clock, Error, Result};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::capacity::Capacity;
use crate::state::{GeoFix, RouteHistoryPoint, ShareGrant, TelemetryUpdate, VehicleState};

/// What an upsert changed, so the orchestration layer knows which events to
/// publish.
#[derive(Debug, Clone)]
pub struct TelemetryApplied {
    pub state: VehicleState,
    pub created: bool,
    pub position_changed: bool,
    pub passengers_changed: bool,
    pub traffic_changed: bool,
}

/// Passenger boarding/alighting action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerAction {
    Board,
    Alight,
}

/// The mutable shared resource of the hot telemetry path. Vehicles are
/// partitioned by device id: the outer map is only locked long enough to
/// resolve the per-vehicle entry, and all mutation happens inside that
/// vehicle's own lock, so updates to different vehicles proceed
/// independently while updates to one vehicle are serialized.
pub struct FleetStore {
    vehicles: RwLock<HashMap<String, Arc<Mutex<VehicleState>>>>,
    clock: Arc<dyn Clock>,
    route_history_cap: usize,
    default_capacity: u32,
}

impl FleetStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, route_history_cap: usize, default_capacity: u32) -> Self {
        Self {
            vehicles: RwLock::new(HashMap::new()),
            clock,
            route_history_cap,
            default_capacity,
        }
    }

    /// Merge a partial telemetry report into the vehicle's state, creating
    /// the state on the first report for a device id.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPosition` for malformed coordinates and
    /// `Error::StaleReport` when the report is not newer than the state
    /// already held.
    pub async fn upsert_telemetry(
        &self, device_id: &str, update: TelemetryUpdate,
    ) -> Result<TelemetryApplied> {
        if let Some(position) = update.position {
            position.validate()?;
        }
        if let Some(destination) = update.destination {
            destination.validate()?;
        }

        let (entry, created) = self.entry_or_create(device_id, update.timestamp).await;
        let mut state = entry.lock().await;

        if !created && update.timestamp <= state.telemetry.last_updated {
            warn!(
                monotonic_counter.stale_reports = 1,
                device_id = %device_id,
                report_at = %update.timestamp,
                last_updated = %state.telemetry.last_updated,
                "dropping duplicate or out-of-order telemetry report"
            );
            return Err(Error::StaleReport(format!(
                "report at {} is not newer than {}",
                update.timestamp, state.telemetry.last_updated
            )));
        }

        let position_changed = apply_position(&mut state, &update);
        let passengers_changed = apply_passengers(&mut state, &update);
        let traffic_changed = apply_traffic(&mut state, &update);

        if let Some(speed) = update.speed {
            state.telemetry.speed = speed;
        }
        if let Some(direction) = update.direction {
            state.telemetry.direction = direction.rem_euclid(360.0);
        }
        if let Some(total) = update.total_capacity {
            state.capacity.set_total(total);
        }
        if let Some(destination) = update.destination {
            state.destination = Some(destination);
        }
        if let Some(expected) = update.expected_duration_minutes {
            state.expected_duration_minutes = Some(expected);
        }

        state.telemetry.last_updated = update.timestamp;

        if position_changed && let Some(position) = update.position {
            let point = RouteHistoryPoint {
                position,
                timestamp: update.timestamp,
                speed: state.telemetry.speed,
                accuracy: update.accuracy,
                direction: state.telemetry.direction,
                passenger_count: state.telemetry.passenger_count,
            };
            push_history(&mut state, point, self.route_history_cap);
        }

        Ok(TelemetryApplied {
            state: state.clone(),
            created,
            position_changed,
            passengers_changed,
            traffic_changed,
        })
    }

    /// Current snapshot for a device.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown device id.
    pub async fn get_state(&self, device_id: &str) -> Result<VehicleState> {
        let entry = self.entry(device_id).await?;
        let mut state = entry.lock().await;
        state.prune_shares(self.clock.now());
        Ok(state.clone())
    }

    /// Stamp the current ETA on a vehicle without treating it as a fresh
    /// telemetry report.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown device id.
    pub async fn set_eta(
        &self, device_id: &str, eta: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        let entry = self.entry(device_id).await?;
        entry.lock().await.telemetry.eta = eta;
        Ok(())
    }

    /// Apply a boarding or alighting event and return the new counters.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown device and
    /// `Error::CapacityFull` when boarding a full vehicle.
    pub async fn passenger_event(
        &self, device_id: &str, action: PassengerAction,
    ) -> Result<Capacity> {
        let entry = self.entry(device_id).await?;
        let mut state = entry.lock().await;

        match action {
            PassengerAction::Board => state.capacity.board()?,
            PassengerAction::Alight => state.capacity.alight(),
        }
        state.telemetry.passenger_count = state.capacity.occupied;

        Ok(state.capacity)
    }

    /// Grant live-location access to `recipients` for `expiry_hours`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown device and
    /// `Error::BadRequest` for an empty recipient list or non-positive
    /// expiry.
    pub async fn share_with(
        &self, device_id: &str, recipients: &[String], expiry_hours: i64,
    ) -> Result<Vec<ShareGrant>> {
        if recipients.is_empty() {
            return Err(Error::BadRequest("recipient list is empty".to_string()));
        }
        if expiry_hours <= 0 {
            return Err(Error::BadRequest(format!("expiry of {expiry_hours}h is not positive")));
        }

        let entry = self.entry(device_id).await?;
        let mut state = entry.lock().await;

        let now = self.clock.now();
        state.prune_shares(now);
        let expires_at = now + Duration::hours(expiry_hours);
        for recipient in recipients {
            state.shared_with.push(ShareGrant {
                recipient: recipient.clone(),
                shared_at: now,
                expires_at,
            });
        }

        Ok(state.shared_with.clone())
    }

    /// Number of vehicles currently tracked.
    pub async fn vehicle_count(&self) -> usize {
        self.vehicles.read().await.len()
    }

    /// Seed a vehicle from a persisted snapshot. No-op when the device is
    /// already tracked; live state always wins over a stored document.
    pub async fn restore(&self, state: VehicleState) -> bool {
        let mut vehicles = self.vehicles.write().await;
        if vehicles.contains_key(&state.device_id) {
            return false;
        }
        vehicles.insert(state.device_id.clone(), Arc::new(Mutex::new(state)));
        true
    }

    async fn entry(&self, device_id: &str) -> Result<Arc<Mutex<VehicleState>>> {
        let vehicles = self.vehicles.read().await;
        vehicles
            .get(device_id)
            .map(Arc::clone)
            .ok_or_else(|| realtime::not_found!("unknown device {device_id}"))
    }

    async fn entry_or_create(
        &self, device_id: &str, first_seen: chrono::DateTime<chrono::Utc>,
    ) -> (Arc<Mutex<VehicleState>>, bool) {
        {
            let vehicles = self.vehicles.read().await;
            if let Some(entry) = vehicles.get(device_id) {
                return (Arc::clone(entry), false);
            }
        }

        let mut vehicles = self.vehicles.write().await;
        // re-check under the write lock; another task may have raced us here
        if let Some(entry) = vehicles.get(device_id) {
            return (Arc::clone(entry), false);
        }

        let state = VehicleState::new(device_id, self.default_capacity, first_seen);
        let entry = Arc::new(Mutex::new(state));
        vehicles.insert(device_id.to_string(), Arc::clone(&entry));
        (entry, true)
    }
}

impl std::fmt::Debug for FleetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetStore")
            .field("route_history_cap", &self.route_history_cap)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

fn apply_position(state: &mut VehicleState, update: &TelemetryUpdate) -> bool {
    let Some(position) = update.position else {
        return false;
    };

    let moved = state.position.is_none_or(|fix| fix.point != position);
    state.previous_position = state.position;
    state.position = Some(GeoFix { point: position, recorded_at: update.timestamp });
    moved
}

fn apply_passengers(state: &mut VehicleState, update: &TelemetryUpdate) -> bool {
    let Some(count) = update.passenger_count else {
        return false;
    };

    let changed = state.telemetry.passenger_count != count;
    state.telemetry.passenger_count = count;
    state.capacity.set_occupied(count);
    changed
}

fn apply_traffic(state: &mut VehicleState, update: &TelemetryUpdate) -> bool {
    let Some(level) = update.traffic_level else {
        return false;
    };

    let changed = state.telemetry.traffic_level != level;
    state.telemetry.traffic_level = level;
    changed
}

fn push_history(state: &mut VehicleState, point: RouteHistoryPoint, cap: usize) {
    state.route_history.push_back(point);
    while state.route_history.len() > cap {
        state.route_history.pop_front();
    }
}
