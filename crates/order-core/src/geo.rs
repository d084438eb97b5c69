//! Geographic types and calculations for map orientation

use serde::{Deserialize, Serialize};

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A labelled point on the map (restaurant, destination or courier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
    /// Marker label shown next to the point
    #[serde(default)]
    pub label: String,
}

impl GeoPoint {
    /// Create an unlabelled point
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            label: String::new(),
        }
    }

    /// Create a labelled point
    pub fn labeled(latitude: f64, longitude: f64, label: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            label: label.into(),
        }
    }

    /// Check if both coordinates are finite and within range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to another point using the Haversine formula.
    /// Returns kilometers; NaN coordinates propagate.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    /// Initial bearing to another point in degrees (-180 to 180).
    ///
    /// The result drives a marker rotation, so non-finite input never
    /// leaks out: it collapses to `0.0`.
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let y = delta_lng.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

        let bearing = y.atan2(x).to_degrees();
        if bearing.is_finite() { bearing } else { 0.0 }
    }
}

/// Haversine distance between two points in kilometers
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    a.distance_to(b)
}

/// Initial bearing from `from` to `to` in degrees, `0.0` on non-finite input
pub fn bearing_degrees(from: &GeoPoint, to: &GeoPoint) -> f64 {
    from.bearing_to(to)
}

// ============================================================================
// TESTS
// ============================================================================
