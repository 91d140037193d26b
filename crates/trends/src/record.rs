use realtime::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::factors::Weather;

/// A completed trip as stored by the historical persistence collaborator.
/// Immutable once written; the engine only reads these in aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    pub route_id: String,
    /// Local day of week, 0 = Sunday.
    pub day_of_week: u8,
    /// Local hour of day, 0-23.
    pub hour_of_day: u8,
    pub actual_duration_minutes: f64,
    pub expected_duration_minutes: f64,
    /// `actual - expected`, floored at zero when recorded (early arrivals
    /// are not stored as negative delay).
    pub delay_minutes: f64,
    pub weather: Weather,
    /// Congestion rank, 1-5.
    pub traffic_rank: u8,
    pub distance_km: f64,
}

impl TripRecord {
    /// Boundary validation for records arriving from outside the engine.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` when a field is out of its documented
    /// range.
    pub fn validate(&self) -> Result<()> {
        if self.route_id.trim().is_empty() {
            return Err(Error::BadRequest("trip record requires a route id".to_string()));
        }
        if self.day_of_week > 6 {
            return Err(Error::BadRequest(format!(
                "day of week {} out of range 0-6",
                self.day_of_week
            )));
        }
        if self.hour_of_day > 23 {
            return Err(Error::BadRequest(format!(
                "hour of day {} out of range 0-23",
                self.hour_of_day
            )));
        }
        if !(1..=5).contains(&self.traffic_rank) {
            return Err(Error::BadRequest(format!(
                "traffic rank {} out of range 1-5",
                self.traffic_rank
            )));
        }
        if !self.actual_duration_minutes.is_finite() || self.actual_duration_minutes < 0.0 {
            return Err(Error::BadRequest("actual duration must be non-negative".to_string()));
        }
        if !self.expected_duration_minutes.is_finite() || self.expected_duration_minutes < 0.0 {
            return Err(Error::BadRequest("expected duration must be non-negative".to_string()));
        }
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(Error::BadRequest("distance must be non-negative".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TripRecord {
        TripRecord {
            route_id: "route-42".to_string(),
            day_of_week: 3,
            hour_of_day: 8,
            actual_duration_minutes: 34.0,
            expected_duration_minutes: 30.0,
            delay_minutes: 4.0,
            weather: Weather::Clear,
            traffic_rank: 2,
            distance_km: 12.5,
        }
    }

    #[test]
    fn valid_record_passes() {
        record().validate().unwrap();
    }

    #[test]
    fn out_of_range_fields_rejected() {
        let mut bad = record();
        bad.day_of_week = 7;
        assert!(bad.validate().is_err());

        let mut bad = record();
        bad.hour_of_day = 24;
        assert!(bad.validate().is_err());

        let mut bad = record();
        bad.traffic_rank = 0;
        assert!(bad.validate().is_err());

        let mut bad = record();
        bad.distance_km = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_value(record()).unwrap();
        assert!(json.get("routeId").is_some());
        assert!(json.get("delayMinutes").is_some());
        assert!(json.get("trafficRank").is_some());
    }
}
