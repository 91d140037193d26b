use std::env;
use std::time::Duration;

use chrono_tz::Tz;
use notifier::SchedulerConfig;

/// Engine tuning, sourced from the environment with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Timezone used to derive local hour-of-day and day-of-week for the
    /// trend analyzer.
    pub timezone: Tz,
    /// Seats assumed for a vehicle whose capacity was never reported.
    pub default_capacity: u32,
    /// Route-history points retained per vehicle.
    pub route_history_cap: usize,
    /// Upper bound on a historical trip query.
    pub history_query_timeout: Duration,
    /// Records fetched per history window.
    pub history_window_limit: usize,
    /// Minutes of warning before a predicted arrival.
    pub arrival_lead_minutes: f64,
    /// ETA overage that counts as a delay.
    pub delay_threshold_minutes: f64,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        let timezone = env::var("TIMEZONE")
            .ok()
            .and_then(|value| value.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::Pacific::Auckland);

        Self {
            timezone,
            default_capacity: env_u32("DEFAULT_BUS_CAPACITY", 50),
            route_history_cap: env_usize("ROUTE_HISTORY_CAP", 100),
            history_query_timeout: Duration::from_millis(env_u64("HISTORY_QUERY_TIMEOUT_MS", 2_000)),
            history_window_limit: env_usize("HISTORY_WINDOW_LIMIT", 50),
            arrival_lead_minutes: env_f64("ARRIVAL_LEAD_MINUTES", 5.0),
            delay_threshold_minutes: env_f64("DELAY_THRESHOLD_MINUTES", 5.0),
        }
    }

    #[must_use]
    pub const fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            arrival_lead_minutes: self.arrival_lead_minutes,
            delay_threshold_minutes: self.delay_threshold_minutes,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|value| value.parse::<f64>().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|value| value.parse::<u32>().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|value| value.parse::<u64>().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|value| value.parse::<usize>().ok()).unwrap_or(default)
}
