use serde::{Deserialize, Serialize};

use crate::LifelineError;

/// Flat degrees-to-miles factor. Only reasonable near mid-latitudes.
pub const MILES_PER_DEGREE: f64 = 69.;
/// Speed assumed for an ambulance when estimating arrival time.
pub const DEFAULT_AVERAGE_SPEED_MPH: f64 = 40.;
/// Shortest ETA ever reported, in minutes.
pub const MIN_ETA_MINUTES: u32 = 1;

const MAP_LATITUDE_SCALE: f64 = 4000.;
const MAP_LONGITUDE_SCALE: f64 = 5000.;

/// A position snapshot as reported by a location sensor or simulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Horizontal accuracy in meters, only present for live sensor readings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f64>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters: None,
        }
    }

    pub fn with_accuracy(self, accuracy_meters: f64) -> Self {
        Self {
            accuracy_meters: Some(accuracy_meters),
            ..self
        }
    }

    /// Straight-line distance in coordinate degrees. Not geodesic.
    pub fn distance_degrees(&self, other: &GeoPoint) -> f64 {
        let lat_diff = other.latitude - self.latitude;
        let lng_diff = other.longitude - self.longitude;
        (lat_diff * lat_diff + lng_diff * lng_diff).sqrt()
    }

    pub fn distance_miles(&self, other: &GeoPoint) -> f64 {
        degrees_to_miles(self.distance_degrees(other))
    }
}

pub fn degrees_to_miles(distance_degrees: f64) -> f64 {
    distance_degrees * MILES_PER_DEGREE
}

/// Minutes needed to cover `distance_miles` at `average_speed_mph`, rounded up and never
/// below [`MIN_ETA_MINUTES`]. An unbounded ETA (zero speed) saturates at `u32::MAX`.
pub fn eta_minutes(distance_miles: f64, average_speed_mph: f64) -> u32 {
    let minutes = (distance_miles / average_speed_mph * 60.).ceil();
    if minutes.is_nan() {
        return MIN_ETA_MINUTES;
    }
    // float to int casts saturate
    minutes.max(MIN_ETA_MINUTES as f64) as u32
}

/// Checks that `average_speed_mph` can be used to estimate arrival times.
pub fn validate_speed(average_speed_mph: f64) -> Result<f64, LifelineError> {
    if average_speed_mph.is_finite() && average_speed_mph > 0. {
        Ok(average_speed_mph)
    } else {
        Err(LifelineError::InvalidUserInput {
            field: "average_speed_mph".to_string(),
            reason: format!("{} is not a positive speed", average_speed_mph),
        })
    }
}

/// Planar projection used to place the user and vehicle markers on a map view.
///
/// The projection is centered on the midpoint of the two positions, with north pointing up
/// (screen `y` grows southwards).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapProjection {
    center_latitude: f64,
    center_longitude: f64,
}

impl MapProjection {
    pub fn centered(user: &GeoPoint, vehicle: &GeoPoint) -> Self {
        Self {
            center_latitude: (user.latitude + vehicle.latitude) / 2.,
            center_longitude: (user.longitude + vehicle.longitude) / 2.,
        }
    }

    /// Offset of `point` from the center of the map, in screen units.
    pub fn project(&self, point: &GeoPoint) -> (f64, f64) {
        (
            (point.longitude - self.center_longitude) * MAP_LONGITUDE_SCALE,
            (self.center_latitude - point.latitude) * MAP_LATITUDE_SCALE,
        )
    }
}
