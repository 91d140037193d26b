use std::fmt::{self, Display};

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Weather condition attached to trip records and prediction requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    Cloudy,
    Rain,
    HeavyRain,
    Fog,
    #[default]
    Unknown,
}

impl Weather {
    /// Duration stretch factor for this condition.
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::Clear | Self::Cloudy => 1.0,
            Self::Rain => 1.2,
            Self::HeavyRain => 1.4,
            Self::Fog => 1.3,
            Self::Unknown => 1.05,
        }
    }
}

impl Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Clear => "clear",
            Self::Cloudy => "cloudy",
            Self::Rain => "rain",
            Self::HeavyRain => "heavy_rain",
            Self::Fog => "fog",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Current conditions a prediction is made under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    /// Local hour of day, 0-23.
    pub hour: u8,
    /// Local day of week, 0 = Sunday.
    pub day_of_week: u8,
    pub weather: Weather,
}

impl Conditions {
    /// Derive local hour/day conditions from a UTC instant in the service
    /// timezone.
    #[must_use]
    pub fn at(instant: DateTime<Utc>, timezone: Tz, weather: Weather) -> Self {
        let local = instant.with_timezone(&timezone);
        Self {
            hour: u8::try_from(local.hour()).unwrap_or(0),
            day_of_week: u8::try_from(local.weekday().num_days_from_sunday()).unwrap_or(0),
            weather,
        }
    }
}

/// Demand factor for an hour of day. Peak windows (7-10 and 17-20) sit at
/// 1.4 with the two busiest hours of each window boosted to 1.5; midday
/// runs 1.2 and late night drops to 0.8.
#[must_use]
pub const fn time_slot_factor(hour: u8) -> f64 {
    match hour {
        8 | 9 | 17 | 18 => 1.5,
        7 | 10 | 19 | 20 => 1.4,
        11..=16 => 1.2,
        22 | 23 | 0..=5 => 0.8,
        _ => 1.0,
    }
}

/// Demand factor for a day of week (0 = Sunday). Sunday is the lightest,
/// Friday the heaviest.
#[must_use]
pub const fn day_of_week_factor(day: u8) -> f64 {
    match day {
        0 => 0.7,
        3 => 1.05,
        4 => 1.1,
        5 => 1.3,
        6 => 0.9,
        _ => 1.0,
    }
}
