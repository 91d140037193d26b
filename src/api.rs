//! Inbound operations consumed by the excluded CRUD/API layer. Each method
//! validates at the boundary, delegates into the engine, and maps failures
//! onto the shared error taxonomy.

use fleet::{PassengerAction, ShareGrant, VehicleState};
use geo::LatLng;
use hub::{EVENT_PASSENGER_UPDATE, bus_topic};
use notifier::Notification;
use realtime::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use trends::{
    Conditions, DelayStatistics, EtaPrediction, TripCompletion, TripRecord, Weather,
};

use crate::Engine;
use crate::events::PassengerUpdate;
use crate::orchestrator::{EtaEstimate, TelemetryOutcome, TelemetryReport};

/// Parameters for a route-level prediction. Hour/day default to "now" in
/// the engine's configured timezone when not supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub route_id: String,
    /// km from origin to destination.
    pub distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
}

impl Engine {
    /// Ingest a telemetry/location report. The orchestration step: state
    /// update, ETA refresh, delay check, timer re-arm, broadcast.
    ///
    /// # Errors
    ///
    /// Propagates boundary failures (`BadRequest`, `InvalidPosition`,
    /// `StaleReport`); analysis failures never surface here.
    pub async fn report_telemetry(&self, report: TelemetryReport) -> Result<TelemetryOutcome> {
        self.orchestrator.handle_telemetry(report).await
    }

    /// Distance and ETA from a vehicle's current position to a destination.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown device, `BadRequest` when it has
    /// no position, `InvalidPosition` for bad coordinates.
    pub async fn eta_to_destination(&self, device_id: &str, destination: LatLng) -> Result<EtaEstimate> {
        self.orchestrator.eta_to(device_id, destination).await
    }

    /// Current state snapshot for a vehicle.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown device id.
    pub async fn vehicle_state(&self, device_id: &str) -> Result<VehicleState> {
        self.fleet.get_state(device_id).await
    }

    /// Historical prediction for a route. Degrades to a tagged
    /// low-confidence fallback when history is missing or slow - never an
    /// error from missing data.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid distance or out-of-range hour/day.
    pub async fn predicted_eta(&self, request: PredictionRequest) -> Result<EtaPrediction> {
        if !request.distance_km.is_finite() || request.distance_km <= 0.0 {
            return Err(Error::BadRequest(format!(
                "distance of {} km is not positive",
                request.distance_km
            )));
        }
        let conditions = self.conditions_from(request.hour, request.day_of_week, request.weather)?;
        Ok(self.analyzer.predicted_eta(&request.route_id, request.distance_km, &conditions).await)
    }

    /// Delay probability and reliability for a route under given (or
    /// current) conditions.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for out-of-range hour/day values.
    pub async fn delay_statistics(
        &self, route_id: &str, hour: Option<u8>, day_of_week: Option<u8>, weather: Option<Weather>,
    ) -> Result<DelayStatistics> {
        let conditions = self.conditions_from(hour, day_of_week, weather)?;
        Ok(self.analyzer.delay_statistics(route_id, Some(&conditions)).await)
    }

    /// Record a completed trip for future predictions.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for out-of-range fields and `BadGateway` when
    /// the historical store rejects the append.
    pub async fn complete_trip(&self, completion: TripCompletion) -> Result<TripRecord> {
        self.analyzer.record_trip(completion).await
    }

    /// Share a vehicle's live location with `recipients` for
    /// `expiry_hours`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown device and `BadRequest` for an
    /// empty recipient list or non-positive expiry.
    pub async fn share_live_location(
        &self, device_id: &str, recipients: &[String], expiry_hours: i64,
    ) -> Result<Vec<ShareGrant>> {
        self.fleet.share_with(device_id, recipients, expiry_hours).await
    }

    /// Apply a boarding or alighting event and broadcast the new counters.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown device and `CapacityFull` when
    /// boarding a full vehicle; counters are unchanged on rejection.
    pub async fn passenger_event(
        &self, device_id: &str, action: PassengerAction,
    ) -> Result<PassengerUpdate> {
        let capacity = self.fleet.passenger_event(device_id, action).await?;
        let update = PassengerUpdate::new(device_id, capacity);

        if let Ok(payload) = serde_json::to_value(&update) {
            let delivered =
                self.hub.publish(&bus_topic(device_id), EVENT_PASSENGER_UPDATE, payload).await;
            info!(
                monotonic_counter.passenger_events = 1,
                device_id = %device_id,
                action = ?action,
                occupied = capacity.occupied,
                delivered = delivered,
            );
        }

        Ok(update)
    }

    /// Route a maintenance alert to a driver's personal topic.
    pub async fn notify_driver(&self, driver_id: &str, notification: Notification) {
        self.scheduler.send_maintenance_alert(driver_id, notification).await;
    }

    /// Broadcast a weather, traffic or route-change advisory to everyone
    /// tracking a vehicle.
    pub async fn broadcast_advisory(&self, device_id: &str, notification: Notification) {
        self.scheduler.send_advisory(device_id, notification).await;
    }

    fn conditions_from(
        &self, hour: Option<u8>, day_of_week: Option<u8>, weather: Option<Weather>,
    ) -> Result<Conditions> {
        if let Some(hour) = hour
            && hour > 23
        {
            return Err(Error::BadRequest(format!("hour {hour} out of range 0-23")));
        }
        if let Some(day) = day_of_week
            && day > 6
        {
            return Err(Error::BadRequest(format!("day of week {day} out of range 0-6")));
        }

        let weather = weather.unwrap_or_default();
        let now = Conditions::at(self.clock.now(), self.config.timezone, weather);
        Ok(Conditions {
            hour: hour.unwrap_or(now.hour),
            day_of_week: day_of_week.unwrap_or(now.day_of_week),
            weather,
        })
    }
}
