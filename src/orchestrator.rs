use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fleet::{FleetStore, TelemetryApplied, TelemetryUpdate, VehicleState};
use geo::{LatLng, TrafficLevel, bearing_degrees, distance_km, eta_minutes};
use hub::{
    EVENT_ETA_UPDATE, EVENT_LOCATION_UPDATE, EVENT_PASSENGER_UPDATE, EVENT_TRACKING_UPDATE,
    EVENT_TRAFFIC_UPDATE, Hub, bus_topic,
};
use notifier::{Notification, NotificationKey, NotificationScheduler};
use realtime::{Clock, Error, Result, VehicleDocStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{
    EtaUpdate, LocationUpdate, PassengerUpdate, TrackingUpdate, TrafficUpdate,
};

/// An inbound telemetry/location report for one vehicle, as delivered by
/// the API layer. Every field beyond the device id is optional; omitted
/// fields leave the stored state untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    pub device_id: String,
    /// Defaults to "now" when the device does not timestamp its reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<LatLng>,
    /// GPS accuracy in metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// km/h.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Compass heading, degrees 0-360.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passenger_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_level: Option<TrafficLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<LatLng>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_duration_minutes: Option<f64>,
}

impl TelemetryReport {
    #[must_use]
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: None,
            position: None,
            accuracy: None,
            speed: None,
            direction: None,
            passenger_count: None,
            traffic_level: None,
            total_capacity: None,
            destination: None,
            expected_duration_minutes: None,
        }
    }
}

/// A computed arrival estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaEstimate {
    /// km to the destination.
    pub distance: f64,
    pub eta_minutes: f64,
    /// Absolute arrival time.
    pub eta: DateTime<Utc>,
    pub current_speed: f64,
    pub traffic_level: TrafficLevel,
}

/// What one telemetry report ended up doing.
#[derive(Debug, Clone)]
pub struct TelemetryOutcome {
    pub state: VehicleState,
    pub eta: Option<EtaEstimate>,
    pub delay_alerted: bool,
}

/// The integration layer: each inbound report updates the state store,
/// refreshes the ETA, drives the delay check and arrival timer, and always
/// ends in a live broadcast. Analysis is additive - when the historical or
/// geometric steps fail, the location still propagates.
pub struct TrackingOrchestrator {
    fleet: Arc<FleetStore>,
    hub: Arc<Hub>,
    scheduler: Arc<NotificationScheduler>,
    docs: Arc<dyn VehicleDocStore>,
    clock: Arc<dyn Clock>,
    /// Bound on the vehicle-document point lookup; no fleet lock is held
    /// while it runs.
    lookup_timeout: std::time::Duration,
}

impl TrackingOrchestrator {
    #[must_use]
    pub fn new(
        fleet: Arc<FleetStore>, hub: Arc<Hub>, scheduler: Arc<NotificationScheduler>,
        docs: Arc<dyn VehicleDocStore>, clock: Arc<dyn Clock>,
        lookup_timeout: std::time::Duration,
    ) -> Self {
        Self { fleet, hub, scheduler, docs, clock, lookup_timeout }
    }

    /// Process one telemetry report end to end.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` for a blank device id,
    /// `Error::InvalidPosition` for malformed coordinates and
    /// `Error::StaleReport` for duplicate or out-of-order reports. Analysis
    /// failures are logged, never returned.
    pub async fn handle_telemetry(&self, report: TelemetryReport) -> Result<TelemetryOutcome> {
        let device_id = report.device_id.trim().to_string();
        if device_id.is_empty() {
            return Err(Error::BadRequest("telemetry report requires a device id".to_string()));
        }

        let prior = self.prior_state(&device_id).await;
        let update = self.build_update(&report, prior.as_ref());

        // 1. state update - the one step allowed to fail the request
        let applied = self.fleet.upsert_telemetry(&device_id, update).await?;

        // 2 + 3. ETA refresh and batch timer re-arm
        let eta = match self.refresh_eta(&applied.state).await {
            Ok(eta) => eta,
            Err(err) => {
                warn!(
                    monotonic_counter.analysis_failures = 1,
                    device_id = %device_id,
                    error = %err,
                    "eta analysis failed; live update continues"
                );
                None
            }
        };

        // 4. delay check against the scheduled baseline
        let mut delay_alerted = false;
        if let (Some(estimate), Some(expected)) =
            (eta.as_ref(), applied.state.expected_duration_minutes)
        {
            delay_alerted = self
                .scheduler
                .check_and_send_delay(&device_id, expected, estimate.eta_minutes)
                .await;
        }

        // 5. live broadcast happens regardless of what analysis did
        self.publish_updates(&applied, eta.as_ref()).await;

        self.persist_snapshot(&applied.state);

        Ok(TelemetryOutcome { state: applied.state, eta, delay_alerted })
    }

    /// Distance/ETA from a vehicle's current position to an arbitrary
    /// destination, without touching stored state.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown device, `Error::BadRequest`
    /// when the vehicle has no position yet, and `Error::InvalidPosition`
    /// for a malformed destination.
    pub async fn eta_to(&self, device_id: &str, destination: LatLng) -> Result<EtaEstimate> {
        let state = self.fleet.get_state(device_id).await?;
        let Some(fix) = state.position else {
            return Err(realtime::bad_request!("device {device_id} has not reported a position"));
        };

        let distance = distance_km(fix.point, destination)?;
        Ok(self.estimate(distance, &state))
    }

    fn estimate(&self, distance: f64, state: &VehicleState) -> EtaEstimate {
        let traffic = state.telemetry.traffic_level;
        let minutes = eta_minutes(distance, state.telemetry.speed, traffic);
        EtaEstimate {
            distance,
            eta_minutes: minutes,
            eta: self.clock.now() + minutes_to_duration(minutes),
            current_speed: geo::effective_speed(state.telemetry.speed),
            traffic_level: traffic,
        }
    }

    /// Latest known state, restored from the persisted document when the
    /// device is not yet live in this process.
    async fn prior_state(&self, device_id: &str) -> Option<VehicleState> {
        if let Ok(state) = self.fleet.get_state(device_id).await {
            return Some(state);
        }

        let lookup = tokio::time::timeout(self.lookup_timeout, self.docs.fetch(device_id));
        match lookup.await.unwrap_or_else(|_| Err(anyhow::anyhow!("document lookup timed out"))) {
            Ok(Some(doc)) => match serde_json::from_slice::<VehicleState>(&doc) {
                Ok(state) => {
                    debug!(device_id = %device_id, "restored vehicle state from document store");
                    self.fleet.restore(state.clone()).await;
                    Some(state)
                }
                Err(err) => {
                    warn!(device_id = %device_id, error = %err, "stored vehicle document is malformed");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(
                    monotonic_counter.persistence_failures = 1,
                    device_id = %device_id,
                    error = %err,
                    "vehicle document lookup failed"
                );
                None
            }
        }
    }

    /// Fold a report into a partial update, deriving speed and bearing from
    /// the previous fix when the device reports movement without them.
    fn build_update(&self, report: &TelemetryReport, prior: Option<&VehicleState>) -> TelemetryUpdate {
        let mut update = TelemetryUpdate::at(report.timestamp.unwrap_or_else(|| self.clock.now()));
        update.position = report.position;
        update.accuracy = report.accuracy;
        update.speed = report.speed;
        update.direction = report.direction;
        update.passenger_count = report.passenger_count;
        update.traffic_level = report.traffic_level;
        update.total_capacity = report.total_capacity;
        update.destination = report.destination;
        update.expected_duration_minutes = report.expected_duration_minutes;

        let (Some(position), Some(prev)) =
            (update.position, prior.and_then(|state| state.position))
        else {
            return update;
        };

        if update.speed.is_none() {
            let elapsed = update.timestamp - prev.recorded_at;
            let hours = f64::from(i32::try_from(elapsed.num_seconds()).unwrap_or(0)) / 3600.0;
            if hours > 0.0 && let Ok(travelled) = distance_km(prev.point, position) {
                update.speed = Some(travelled / hours);
            }
        }
        if update.direction.is_none()
            && let Ok(bearing) = bearing_degrees(prev.point, position)
        {
            update.direction = Some(bearing);
        }

        update
    }

    /// Step 2 + 3: compute the ETA towards the known destination, stamp it
    /// on the vehicle, and re-arm the shared arrival timer when anyone is
    /// tracking the vehicle. One timer covers every tracker; re-arming per
    /// subscriber would multiply timers for nothing.
    async fn refresh_eta(&self, state: &VehicleState) -> Result<Option<EtaEstimate>> {
        let (Some(fix), Some(destination)) = (state.position, state.destination) else {
            return Ok(None);
        };

        let distance = distance_km(fix.point, destination)?;
        let estimate = self.estimate(distance, state);
        self.fleet.set_eta(&state.device_id, Some(estimate.eta)).await?;

        if self.hub.members_of(&bus_topic(&state.device_id)).await > 0 {
            self.scheduler
                .schedule_arrival(
                    NotificationKey::all_trackers(&state.device_id),
                    estimate.eta_minutes,
                    Notification::arrival(&state.device_id, estimate.eta_minutes),
                )
                .await;
        }

        Ok(Some(estimate))
    }

    /// Step 5: fan the new state out to the vehicle's topic.
    async fn publish_updates(&self, applied: &TelemetryApplied, eta: Option<&EtaEstimate>) {
        let state = &applied.state;
        let topic = bus_topic(&state.device_id);

        if let Some(update) = LocationUpdate::from_state(state) {
            self.publish(&topic, EVENT_LOCATION_UPDATE, &update).await;
        }

        self.publish(&topic, EVENT_TRACKING_UPDATE, &TrackingUpdate::from_state(state)).await;

        if let Some(estimate) = eta {
            let update = EtaUpdate {
                device_id: state.device_id.clone(),
                distance: estimate.distance,
                eta_minutes: estimate.eta_minutes,
                eta: estimate.eta,
                current_speed: estimate.current_speed,
                traffic_level: estimate.traffic_level,
            };
            self.publish(&topic, EVENT_ETA_UPDATE, &update).await;
        }

        if applied.passengers_changed {
            let update = PassengerUpdate::new(&state.device_id, state.capacity);
            self.publish(&topic, EVENT_PASSENGER_UPDATE, &update).await;
        }

        if applied.traffic_changed {
            let update = TrafficUpdate {
                device_id: state.device_id.clone(),
                traffic_level: state.telemetry.traffic_level,
            };
            self.publish(&topic, EVENT_TRAFFIC_UPDATE, &update).await;
        }
    }

    async fn publish<T: Serialize>(&self, topic: &str, event: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => {
                let delivered = self.hub.publish(topic, event, value).await;
                info!(
                    monotonic_counter.events_published = 1,
                    topic = %topic,
                    event = %event,
                    delivered = delivered,
                );
            }
            Err(err) => {
                warn!(topic = %topic, event = %event, error = %err, "failed to serialize event");
            }
        }
    }

    /// Mirror the state document to the persistence collaborator. Runs off
    /// the update path so a slow store never delays live tracking.
    fn persist_snapshot(&self, state: &VehicleState) {
        let doc = match serde_json::to_vec(state) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(device_id = %state.device_id, error = %err, "failed to serialize vehicle document");
                return;
            }
        };

        let docs = Arc::clone(&self.docs);
        let device_id = state.device_id.clone();
        tokio::spawn(async move {
            if let Err(err) = docs.store(&device_id, &doc).await {
                warn!(
                    monotonic_counter.persistence_failures = 1,
                    device_id = %device_id,
                    error = %err,
                    "vehicle document store failed"
                );
            }
        });
    }
}

impl std::fmt::Debug for TrackingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingOrchestrator").finish_non_exhaustive()
    }
}

fn minutes_to_duration(minutes: f64) -> Duration {
    #[allow(clippy::cast_possible_truncation)]
    let millis = (minutes * 60_000.0) as i64;
    Duration::milliseconds(millis)
}
