//! Topic and event naming shared by everything that publishes to the hub.

/// Vehicle state + notifications scoped to trackers of one vehicle.
#[must_use]
pub fn bus_topic(device_id: &str) -> String {
    format!("bus:{device_id}")
}

/// Notifications scoped to one rider.
#[must_use]
pub fn rider_topic(user_id: &str) -> String {
    format!("notifications:{user_id}")
}

/// Alerts scoped to one driver.
#[must_use]
pub fn driver_topic(driver_id: &str) -> String {
    format!("driver:{driver_id}")
}

pub const EVENT_LOCATION_UPDATE: &str = "location-update";
pub const EVENT_TRACKING_UPDATE: &str = "tracking-update";
pub const EVENT_ETA_UPDATE: &str = "eta-update";
pub const EVENT_PASSENGER_UPDATE: &str = "passenger-update";
pub const EVENT_TRAFFIC_UPDATE: &str = "traffic-update";
pub const EVENT_NOTIFICATION: &str = "notification";
