use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Who a scheduled notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    /// Everyone currently joined to the vehicle's topic.
    AllTrackers,
    /// One rider, via their personal notification topic.
    User(String),
}

/// Composite timer identity: one device, one scope, at most one pending
/// timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub device_id: String,
    pub scope: NotificationScope,
}

impl NotificationKey {
    #[must_use]
    pub fn all_trackers(device_id: impl Into<String>) -> Self {
        Self { device_id: device_id.into(), scope: NotificationScope::AllTrackers }
    }

    #[must_use]
    pub fn user(device_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { device_id: device_id.into(), scope: NotificationScope::User(user_id.into()) }
    }

    /// The hub topic a notification under this key is published to.
    #[must_use]
    pub fn topic(&self) -> String {
        match &self.scope {
            NotificationScope::AllTrackers => hub::bus_topic(&self.device_id),
            NotificationScope::User(user_id) => hub::rider_topic(user_id),
        }
    }
}

impl Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            NotificationScope::AllTrackers => write!(f, "{}/all", self.device_id),
            NotificationScope::User(user_id) => write!(f, "{}/user:{user_id}", self.device_id),
        }
    }
}
