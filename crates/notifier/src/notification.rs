use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Notification categories published to topic members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BusArrival,
    BusDelayed,
    RouteChange,
    WeatherAlert,
    MaintenanceAlert,
    TrafficAlert,
    Emergency,
    System,
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusArrival => "bus_arrival",
            Self::BusDelayed => "bus_delayed",
            Self::RouteChange => "route_change",
            Self::WeatherAlert => "weather_alert",
            Self::MaintenanceAlert => "maintenance_alert",
            Self::TrafficAlert => "traffic_alert",
            Self::Emergency => "emergency",
            Self::System => "system",
        };
        f.write_str(label)
    }
}

/// The payload delivered under a `notification` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub device_id: String,
    /// Stamped when the notification actually fires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Kind-specific extras.
    pub metadata: Value,
}

impl Notification {
    #[must_use]
    pub fn new(
        kind: NotificationKind, device_id: impl Into<String>, title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            device_id: device_id.into(),
            timestamp: None,
            metadata: Value::Null,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Arrival-imminent notice for a vehicle.
    #[must_use]
    pub fn arrival(device_id: &str, eta_minutes: f64) -> Self {
        Self::new(
            NotificationKind::BusArrival,
            device_id,
            "Bus arriving soon",
            format!("Bus {device_id} is about {} minutes away", eta_minutes.round()),
        )
        .with_metadata(json!({ "etaMinutes": eta_minutes }))
    }

    /// Running-late alert with the observed overage.
    #[must_use]
    pub fn delay(device_id: &str, expected_minutes: f64, actual_minutes: f64) -> Self {
        let overage = actual_minutes - expected_minutes;
        Self::new(
            NotificationKind::BusDelayed,
            device_id,
            "Bus delayed",
            format!("Bus {device_id} is running about {} minutes late", overage.round()),
        )
        .with_metadata(json!({
            "expectedMinutes": expected_minutes,
            "actualMinutes": actual_minutes,
            "delayMinutes": overage,
        }))
    }

    #[must_use]
    pub fn maintenance(device_id: &str, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::MaintenanceAlert, device_id, "Maintenance required", message)
    }

    #[must_use]
    pub fn weather(device_id: &str, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::WeatherAlert, device_id, "Weather advisory", message)
    }

    #[must_use]
    pub fn traffic(device_id: &str, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::TrafficAlert, device_id, "Heavy traffic ahead", message)
    }
}
