use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters used by the Haversine formula
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single position report from the location source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported horizontal accuracy in meters, when the source provides one
    pub accuracy_m: Option<f64>,
    pub captured_at: DateTime<Local>,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, captured_at: DateTime<Local>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            captured_at,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Great-circle distance in meters to `other`
    pub fn distance_to(&self, other: &GeoFix) -> f64 {
        calculate_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Whether this fix is precise enough to be used under `max_accuracy_m`.
    /// Fixes without a reported accuracy always pass.
    pub fn within_accuracy(&self, max_accuracy_m: Option<f64>) -> bool {
        match (max_accuracy_m, self.accuracy_m) {
            (Some(limit), Some(reported)) => reported <= limit,
            _ => true,
        }
    }
}

/// Haversine distance in meters between two coordinates given in degrees
pub fn calculate_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}
