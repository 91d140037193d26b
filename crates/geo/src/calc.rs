use realtime::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::traffic::TrafficLevel;

/// Mean Earth radius used for great-circle distance.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Cruising speed substituted when a vehicle reports no usable speed.
pub const DEFAULT_CRUISING_SPEED_KMH: f64 = 25.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check the pair is finite and within range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPosition` when either component is NaN,
    /// infinite, or outside [-90, 90] / [-180, 180].
    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(Error::InvalidPosition(format!("latitude {} out of range", self.lat)));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(Error::InvalidPosition(format!("longitude {} out of range", self.lng)));
        }
        Ok(())
    }
}

/// Great-circle (haversine) distance between two points, in kilometres.
///
/// Symmetric, zero for identical points, never negative.
///
/// # Errors
///
/// Returns `Error::InvalidPosition` when either point fails validation.
pub fn distance_km(from: LatLng, to: LatLng) -> Result<f64> {
    from.validate()?;
    to.validate()?;

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Ok(EARTH_RADIUS_KM * c)
}

/// Initial compass bearing from `from` towards `to`, in degrees [0, 360).
///
/// # Errors
///
/// Returns `Error::InvalidPosition` when either point fails validation.
pub fn bearing_degrees(from: LatLng, to: LatLng) -> Result<f64> {
    from.validate()?;
    to.validate()?;

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();

    Ok((y.atan2(x).to_degrees() + 360.0) % 360.0)
}

/// Travel time in minutes for `distance_km` at `speed_kmh` under the given
/// traffic level. A non-positive speed falls back to
/// [`DEFAULT_CRUISING_SPEED_KMH`] rather than dividing by zero.
#[must_use]
pub fn eta_minutes(distance_km: f64, speed_kmh: f64, traffic: TrafficLevel) -> f64 {
    distance_km / effective_speed(speed_kmh) * 60.0 * traffic.multiplier()
}

/// The speed actually used for ETA arithmetic: the reported speed when
/// positive, otherwise the default cruising speed.
#[must_use]
pub fn effective_speed(speed_kmh: f64) -> f64 {
    if speed_kmh > 0.0 { speed_kmh } else { DEFAULT_CRUISING_SPEED_KMH }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AOTEA: LatLng = LatLng::new(-36.8485, 174.7633);
    const NEWMARKET: LatLng = LatLng::new(-36.8694, 174.7769);

    #[test]
    fn distance_is_symmetric() {
        let out = distance_km(AOTEA, NEWMARKET).unwrap();
        let back = distance_km(NEWMARKET, AOTEA).unwrap();
        assert!((out - back).abs() < 1e-9);
        assert!(out > 0.0);
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(distance_km(AOTEA, AOTEA).unwrap(), 0.0);
    }

    #[test]
    fn known_distance() {
        // Aotea Square to Newmarket station is roughly 2.6 km as the crow flies.
        let km = distance_km(AOTEA, NEWMARKET).unwrap();
        assert!((2.0..3.5).contains(&km), "unexpected distance {km}");
    }

    #[test]
    fn bearing_cardinal_points() {
        let origin = LatLng::new(0.0, 0.0);
        let east = bearing_degrees(origin, LatLng::new(0.0, 1.0)).unwrap();
        let north = bearing_degrees(origin, LatLng::new(1.0, 0.0)).unwrap();

        assert!((east - 90.0).abs() < 1e-9);
        assert!(north.abs() < 1e-9);
    }

    #[test]
    fn bearing_always_in_range() {
        let points = [
            LatLng::new(-36.8485, 174.7633),
            LatLng::new(51.5007, -0.1246),
            LatLng::new(-33.8568, 151.2153),
            LatLng::new(35.6586, 139.7454),
        ];
        for from in points {
            for to in points {
                let b = bearing_degrees(from, to).unwrap();
                assert!((0.0..360.0).contains(&b), "bearing {b} out of range");
            }
        }
    }

    #[test]
    fn invalid_coordinates_rejected() {
        let bad_lat = LatLng::new(91.0, 0.0);
        let bad_lng = LatLng::new(0.0, 200.0);
        let nan = LatLng::new(f64::NAN, 0.0);

        assert!(distance_km(bad_lat, AOTEA).is_err());
        assert!(distance_km(AOTEA, bad_lng).is_err());
        assert!(bearing_degrees(nan, AOTEA).is_err());
    }

    #[test]
    fn eta_scales_with_inputs() {
        let base = eta_minutes(10.0, 40.0, TrafficLevel::Light);
        assert!((base - 15.0).abs() < 1e-9);

        // non-decreasing in distance and traffic, non-increasing in speed
        assert!(eta_minutes(20.0, 40.0, TrafficLevel::Light) >= base);
        assert!(eta_minutes(10.0, 40.0, TrafficLevel::Severe) >= base);
        assert!(eta_minutes(10.0, 80.0, TrafficLevel::Light) <= base);
    }

    #[test]
    fn zero_speed_uses_default_cruise() {
        let eta = eta_minutes(25.0, 0.0, TrafficLevel::Light);
        assert!((eta - 60.0).abs() < 1e-9);

        let eta = eta_minutes(25.0, -5.0, TrafficLevel::Light);
        assert!((eta - 60.0).abs() < 1e-9);
    }
}
