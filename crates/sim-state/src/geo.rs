//! Geographic Primitives
//!
//! Coordinates and the distance/interpolation math shared by routing,
//! mobility, and visibility.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in kilometers (haversine).
    pub fn haversine_km(self, other: Coordinate) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let dphi = (other.lat - self.lat).to_radians();
        let dlambda = (other.lon - self.lon).to_radians();
        let a = (dphi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// Distance to `other` in meters.
    pub fn haversine_m(self, other: Coordinate) -> f64 {
        self.haversine_km(other) * 1000.0
    }

    /// Linear interpolation toward `other` at `fraction` in [0, 1].
    ///
    /// Adequate at town scale; for the short segments produced by route
    /// geometry the error versus great-circle interpolation is negligible.
    pub fn interpolate(self, other: Coordinate, fraction: f64) -> Coordinate {
        Coordinate {
            lat: self.lat + (other.lat - self.lat) * fraction,
            lon: self.lon + (other.lon - self.lon) * fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let p = Coordinate::new(43.80, -70.16);
        assert!(p.haversine_km(p) < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Roughly 3.3 km between these two North Yarmouth points.
        let a = Coordinate::new(43.80, -70.16);
        let b = Coordinate::new(43.81, -70.20);
        let d = a.haversine_km(b);
        assert!(d > 3.0 && d < 3.6, "unexpected distance: {}", d);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = Coordinate::new(43.80, -70.16);
        let b = Coordinate::new(43.81, -70.20);
        assert!((a.haversine_km(b) - b.haversine_km(a)).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = Coordinate::new(43.80, -70.16);
        let b = Coordinate::new(43.81, -70.20);
        assert_eq!(a.interpolate(b, 0.0), a);
        assert_eq!(a.interpolate(b, 1.0), b);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Coordinate::new(43.80, -70.16);
        let b = Coordinate::new(43.81, -70.20);
        let mid = a.interpolate(b, 0.5);
        assert!((mid.lat - 43.805).abs() < 1e-9);
        assert!((mid.lon - -70.18).abs() < 1e-9);
    }
}
