//! Payloads published to the broadcast hub, one struct per event name.

use chrono::{DateTime, Utc};
use fleet::{Capacity, GeoFix, OccupancyStatus, VehicleState};
use geo::TrafficLevel;
use serde::{Deserialize, Serialize};

/// `location-update`: raw position movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub device_id: String,
    pub position: GeoFix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_position: Option<GeoFix>,
    pub last_updated: DateTime<Utc>,
}

impl LocationUpdate {
    #[must_use]
    pub fn from_state(state: &VehicleState) -> Option<Self> {
        let position = state.position?;
        Some(Self {
            device_id: state.device_id.clone(),
            position,
            previous_position: state.previous_position,
            last_updated: state.telemetry.last_updated,
        })
    }
}

/// Live readings bundled into a `tracking-update`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeData {
    pub speed: f64,
    pub direction: f64,
    pub passenger_count: u32,
    pub traffic_level: TrafficLevel,
}

/// `tracking-update`: the full live picture for a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    pub device_id: String,
    pub real_time_data: RealTimeData,
    pub capacity: Capacity,
    pub traffic_condition: TrafficLevel,
}

impl TrackingUpdate {
    #[must_use]
    pub fn from_state(state: &VehicleState) -> Self {
        Self {
            device_id: state.device_id.clone(),
            real_time_data: RealTimeData {
                speed: state.telemetry.speed,
                direction: state.telemetry.direction,
                passenger_count: state.telemetry.passenger_count,
                traffic_level: state.telemetry.traffic_level,
            },
            capacity: state.capacity,
            traffic_condition: state.telemetry.traffic_level,
        }
    }
}

/// `eta-update`: a freshly computed arrival estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaUpdate {
    pub device_id: String,
    /// km to the destination.
    pub distance: f64,
    pub eta_minutes: f64,
    /// Absolute arrival time.
    pub eta: DateTime<Utc>,
    pub current_speed: f64,
    pub traffic_level: TrafficLevel,
}

/// `passenger-update`: capacity counters after a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerUpdate {
    pub device_id: String,
    pub occupied_seats: u32,
    pub available_seats: u32,
    pub total_seats: u32,
    pub occupancy_status: OccupancyStatus,
}

impl PassengerUpdate {
    #[must_use]
    pub fn new(device_id: impl Into<String>, capacity: Capacity) -> Self {
        Self {
            device_id: device_id.into(),
            occupied_seats: capacity.occupied,
            available_seats: capacity.available,
            total_seats: capacity.total,
            occupancy_status: capacity.status(),
        }
    }
}

/// `traffic-update`: congestion level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficUpdate {
    pub device_id: String,
    pub traffic_level: TrafficLevel,
}
