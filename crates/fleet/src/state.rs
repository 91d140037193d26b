use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use geo::{LatLng, TrafficLevel};
use serde::{Deserialize, Serialize};

use crate::capacity::Capacity;

/// A position fix with the instant it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFix {
    #[serde(flatten)]
    pub point: LatLng,
    pub recorded_at: DateTime<Utc>,
}

/// Live telemetry attached to a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    /// km/h.
    pub speed: f64,
    /// Compass heading, degrees 0-360.
    pub direction: f64,
    pub passenger_count: u32,
    pub traffic_level: TrafficLevel,
    /// Predicted arrival at the current destination, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

/// A point in the bounded route-history log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteHistoryPoint {
    #[serde(flatten)]
    pub position: LatLng,
    pub timestamp: DateTime<Utc>,
    /// km/h at the time of the fix.
    pub speed: f64,
    /// GPS accuracy in metres, when the device reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub direction: f64,
    pub passenger_count: u32,
}

/// A live-location share grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareGrant {
    pub recipient: String,
    pub shared_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Everything the engine holds for one vehicle. Created on the first
/// telemetry report for a device id; mutated only through the store; never
/// deleted within the engine (retention is an external concern).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleState {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoFix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_position: Option<GeoFix>,
    /// Append-only within the retention window; oldest points are evicted
    /// once the bound is reached.
    pub route_history: VecDeque<RouteHistoryPoint>,
    pub telemetry: Telemetry,
    pub capacity: Capacity,
    pub shared_with: Vec<ShareGrant>,
    /// Externally supplied tracking target, when one is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<LatLng>,
    /// Scheduled trip duration used as the delay baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_duration_minutes: Option<f64>,
}

impl VehicleState {
    #[must_use]
    pub fn new(device_id: impl Into<String>, total_capacity: u32, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            position: None,
            previous_position: None,
            route_history: VecDeque::new(),
            telemetry: Telemetry {
                speed: 0.0,
                direction: 0.0,
                passenger_count: 0,
                traffic_level: TrafficLevel::Unknown,
                eta: None,
                last_updated: now,
            },
            capacity: Capacity::new(total_capacity),
            shared_with: Vec::new(),
            destination: None,
            expected_duration_minutes: None,
        }
    }

    /// Drop grants that have expired as of `now`.
    pub fn prune_shares(&mut self, now: DateTime<Utc>) {
        self.shared_with.retain(|grant| grant.expires_at > now);
    }
}

/// Partial telemetry merge: only supplied fields change, everything else is
/// preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryUpdate {
    /// Instant the report was taken. Reports at or before the state's
    /// `last_updated` are rejected as stale.
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<LatLng>,
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

impl TelemetryUpdate {
    #[must_use]
    pub const fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
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
