use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Road traffic level reported with vehicle telemetry.
///
/// Multipliers stretch a free-flow ETA; the severity rank (1-5) is the
/// congestion code recorded against historical trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
    Severe,
    #[default]
    Unknown,
}

impl TrafficLevel {
    /// ETA stretch factor for this traffic level.
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Light => 1.0,
            Self::Moderate => 1.3,
            Self::Heavy => 1.6,
            Self::Severe => 2.0,
            Self::Unknown => 1.2,
        }
    }

    /// Congestion rank 1-5 recorded on trip records.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Light => 1,
            Self::Moderate => 2,
            Self::Unknown => 3,
            Self::Heavy => 4,
            Self::Severe => 5,
        }
    }

    /// Inverse of [`Self::severity`]; out-of-range ranks map to `Unknown`.
    #[must_use]
    pub const fn from_severity(rank: u8) -> Self {
        match rank {
            1 => Self::Light,
            2 => Self::Moderate,
            4 => Self::Heavy,
            5 => Self::Severe,
            _ => Self::Unknown,
        }
    }
}

impl Display for TrafficLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
            Self::Severe => "severe",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

impl FromStr for TrafficLevel {
    type Err = realtime::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "moderate" => Ok(Self::Moderate),
            "heavy" => Ok(Self::Heavy),
            "severe" => Ok(Self::Severe),
            "unknown" => Ok(Self::Unknown),
            other => Err(realtime::Error::BadRequest(format!("unknown traffic level: {other}"))),
        }
    }
}
