use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hub::{EVENT_NOTIFICATION, Hub, bus_topic, driver_topic};
use realtime::Clock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::key::NotificationKey;
use crate::notification::Notification;

/// Minutes of warning riders get before a predicted arrival.
pub const DEFAULT_ARRIVAL_LEAD_MINUTES: f64 = 5.0;

/// Overage beyond the expected ETA that counts as a delay.
pub const DEFAULT_DELAY_THRESHOLD_MINUTES: f64 = 5.0;

/// Tuning for the scheduler; defaults match production behavior, tests dial
/// the lead down so timers fire within milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub arrival_lead_minutes: f64,
    pub delay_threshold_minutes: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            arrival_lead_minutes: DEFAULT_ARRIVAL_LEAD_MINUTES,
            delay_threshold_minutes: DEFAULT_DELAY_THRESHOLD_MINUTES,
        }
    }
}

struct TimerEntry {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Deferred, cancelable one-shot notification timers keyed by
/// [`NotificationKey`]. The timer map is the shared resource here: every
/// arm/cancel/fire transition happens under its lock, which is what makes
/// the cancel-then-replace sequence atomic per key and keeps exactly one
/// timer outstanding per key.
pub struct NotificationScheduler {
    hub: Arc<Hub>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    timers: Arc<Mutex<HashMap<NotificationKey, TimerEntry>>>,
    next_seq: std::sync::atomic::AtomicU64,
}

impl NotificationScheduler {
    #[must_use]
    pub fn new(hub: Arc<Hub>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            hub,
            clock,
            config,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Arm (or re-arm) the arrival notice for a key.
    ///
    /// A non-positive ETA is a no-op. An ETA inside the lead window fires
    /// immediately. Otherwise a one-shot timer is armed to fire `lead`
    /// minutes ahead of arrival, replacing any timer already held by the
    /// key.
    pub async fn schedule_arrival(
        &self, key: NotificationKey, eta_minutes: f64, notification: Notification,
    ) {
        if eta_minutes <= 0.0 || !eta_minutes.is_finite() {
            return;
        }

        if eta_minutes <= self.config.arrival_lead_minutes {
            self.cancel(&key).await;
            self.fire(&key, notification).await;
            return;
        }

        let delay =
            Duration::from_secs_f64((eta_minutes - self.config.arrival_lead_minutes) * 60.0);
        let seq = self.next_seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let hub = Arc::clone(&self.hub);
        let clock = Arc::clone(&self.clock);
        let timers = Arc::clone(&self.timers);
        let task_key = key.clone();

        // hold the map lock across spawn + insert so the new task cannot
        // observe the map before its own entry is registered, and so
        // replacement is atomic per key
        let mut held = self.timers.lock().await;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Fire only while still the registered timer for this key; a
            // cancel or replacement observed here means stand down.
            {
                let mut timers = timers.lock().await;
                let still_armed =
                    timers.get(&task_key).is_some_and(|entry| entry.seq == seq);
                if !still_armed {
                    return;
                }
                timers.remove(&task_key);
            }

            let mut notification = notification;
            notification.timestamp = Some(clock.now());
            let topic = task_key.topic();
            let payload = match serde_json::to_value(&notification) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(key = %task_key, error = %err, "failed to serialize notification");
                    return;
                }
            };

            let delivered = hub.publish(&topic, EVENT_NOTIFICATION, payload).await;
            info!(
                monotonic_counter.notifications_sent = 1,
                key = %task_key,
                topic = %topic,
                delivered = delivered,
                "arrival notification fired"
            );
        });

        if let Some(previous) = held.insert(key.clone(), TimerEntry { seq, handle }) {
            previous.handle.abort();
            debug!(key = %key, "replaced pending arrival timer");
        }
    }

    /// Compare an expected ETA against the freshly computed one and publish
    /// a delay alert when the overage breaches the threshold. Evaluated
    /// synchronously on each telemetry update, never timer-deferred.
    /// Returns whether an alert was published.
    pub async fn check_and_send_delay(
        &self, device_id: &str, expected_minutes: f64, actual_minutes: f64,
    ) -> bool {
        let overage = actual_minutes - expected_minutes;
        if overage <= self.config.delay_threshold_minutes {
            return false;
        }

        let notification = Notification::delay(device_id, expected_minutes, actual_minutes);
        let delivered = self.publish_notification(&bus_topic(device_id), notification).await;
        info!(
            monotonic_counter.delay_alerts_sent = 1,
            device_id = %device_id,
            overage_minutes = overage,
            delivered = delivered,
            "delay alert published"
        );
        true
    }

    /// Publish a notification to a key's topic right now, bypassing any
    /// timer.
    pub async fn fire(&self, key: &NotificationKey, notification: Notification) {
        let delivered = self.publish_notification(&key.topic(), notification).await;
        info!(
            monotonic_counter.notifications_sent = 1,
            key = %key,
            delivered = delivered,
            "notification fired immediately"
        );
    }

    /// Immediate maintenance alert on the driver's own topic.
    pub async fn send_maintenance_alert(&self, driver_id: &str, notification: Notification) {
        let delivered = self.publish_notification(&driver_topic(driver_id), notification).await;
        info!(
            monotonic_counter.notifications_sent = 1,
            driver_id = %driver_id,
            delivered = delivered,
            "maintenance alert published"
        );
    }

    /// Immediate advisory (weather, traffic, route change) to everyone
    /// tracking a vehicle.
    pub async fn send_advisory(&self, device_id: &str, notification: Notification) {
        let delivered = self.publish_notification(&bus_topic(device_id), notification).await;
        info!(
            monotonic_counter.notifications_sent = 1,
            device_id = %device_id,
            delivered = delivered,
            "advisory published"
        );
    }

    async fn publish_notification(&self, topic: &str, mut notification: Notification) -> usize {
        notification.timestamp = Some(self.clock.now());
        let Ok(payload) = serde_json::to_value(&notification) else {
            return 0;
        };
        self.hub.publish(topic, EVENT_NOTIFICATION, payload).await
    }

    /// Cancel the pending timer for a key, if any. Cancelling an idle key
    /// is a no-op. Returns whether a timer was actually cancelled.
    pub async fn cancel(&self, key: &NotificationKey) -> bool {
        let Some(entry) = self.timers.lock().await.remove(key) else {
            return false;
        };
        entry.handle.abort();
        debug!(key = %key, "cancelled pending timer");
        true
    }

    /// Cancel every timer scoped to a device.
    pub async fn cancel_all_for_device(&self, device_id: &str) -> usize {
        let mut timers = self.timers.lock().await;
        let keys: Vec<NotificationKey> =
            timers.keys().filter(|key| key.device_id == device_id).cloned().collect();
        for key in &keys {
            if let Some(entry) = timers.remove(key) {
                entry.handle.abort();
            }
        }
        keys.len()
    }

    /// Number of timers currently outstanding.
    pub async fn active_count(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Cancel every outstanding timer. Called on process shutdown so no
    /// timer can fire afterwards.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        let drained = timers.len();
        for (_, entry) in timers.drain() {
            entry.handle.abort();
        }
        if drained > 0 {
            info!(cancelled = drained, "notification scheduler drained on shutdown");
        }
    }
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler").field("config", &self.config).finish_non_exhaustive()
    }
}
