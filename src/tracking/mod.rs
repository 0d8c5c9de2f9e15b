pub(crate) mod observer;
pub mod source;

pub use observer::{TrackingStream, observe_tracking};
use serde::{Deserialize, Serialize};
pub use source::{
    ChannelPositionSource, PositionSource, ReplayPositionSource, UnavailablePositionSource,
};

use crate::{
    LifelineError,
    geo::{self, GeoPoint},
};

/// Below this distance (in degrees, roughly 50m) the vehicle is considered to have reached the
/// user and stops moving.
pub const CONVERGENCE_RADIUS_DEG: f64 = 0.0005;
/// Fraction of the remaining gap the vehicle covers on every tick.
pub const STEP_FRACTION: f64 = 0.1;

pub const DEFAULT_USER_POSITION: GeoPoint = GeoPoint {
    latitude: 42.3601,
    longitude: -71.0589,
    accuracy_meters: None,
};
pub const DEFAULT_VEHICLE_POSITION: GeoPoint = GeoPoint {
    latitude: 42.3565,
    longitude: -71.0675,
    accuracy_meters: None,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    pub user_position: GeoPoint,
    pub vehicle_position: GeoPoint,
}

impl TrackingState {
    pub fn distance_degrees(&self) -> f64 {
        self.user_position.distance_degrees(&self.vehicle_position)
    }

    pub fn has_arrived(&self) -> bool {
        self.distance_degrees() < CONVERGENCE_RADIUS_DEG
    }
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            user_position: DEFAULT_USER_POSITION,
            vehicle_position: DEFAULT_VEHICLE_POSITION,
        }
    }
}

/// One rendered frame of the tracking view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    /// Number of simulation steps applied so far
    pub tick: u64,
    pub state: TrackingState,
    pub distance_miles: f64,
    pub eta_minutes: u32,
    pub arrived: bool,
}

/// Moves a simulated vehicle toward the user by a fixed fraction of the gap on every tick.
///
/// The approach is an exponential decay, so the vehicle never lands exactly on the user. Use
/// [`LocationSimulator::has_arrived`] rather than comparing positions.
#[derive(Clone, Debug)]
pub struct LocationSimulator {
    state: TrackingState,
    average_speed_mph: f64,
    ticks: u64,
}

impl Default for LocationSimulator {
    fn default() -> Self {
        Self::new(DEFAULT_USER_POSITION, DEFAULT_VEHICLE_POSITION)
    }
}

impl LocationSimulator {
    pub fn new(user_position: GeoPoint, vehicle_position: GeoPoint) -> Self {
        Self {
            state: TrackingState {
                user_position,
                vehicle_position,
            },
            average_speed_mph: geo::DEFAULT_AVERAGE_SPEED_MPH,
            ticks: 0,
        }
    }

    /// Speed used for ETAs. Must be positive and finite.
    pub fn with_average_speed(mut self, average_speed_mph: f64) -> Result<Self, LifelineError> {
        self.average_speed_mph = geo::validate_speed(average_speed_mph)?;
        Ok(self)
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn user_position(&self) -> &GeoPoint {
        &self.state.user_position
    }

    pub fn vehicle_position(&self) -> &GeoPoint {
        &self.state.vehicle_position
    }

    /// Replaces the user position. Coordinates are not range checked.
    pub fn update_user_position(&mut self, point: GeoPoint) {
        self.state.user_position = point;
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
        let user = self.state.user_position;
        let vehicle = &mut self.state.vehicle_position;

        let lat_diff = user.latitude - vehicle.latitude;
        let lng_diff = user.longitude - vehicle.longitude;
        if (lat_diff * lat_diff + lng_diff * lng_diff).sqrt() < CONVERGENCE_RADIUS_DEG {
            return;
        }

        *vehicle = GeoPoint::new(
            vehicle.latitude + lat_diff * STEP_FRACTION,
            vehicle.longitude + lng_diff * STEP_FRACTION,
        );
    }

    pub fn has_arrived(&self) -> bool {
        self.state.has_arrived()
    }

    pub fn distance_degrees(&self) -> f64 {
        self.state.distance_degrees()
    }

    pub fn distance_miles(&self) -> f64 {
        geo::degrees_to_miles(self.distance_degrees())
    }

    pub fn eta_minutes(&self) -> u32 {
        self.eta_minutes_at(self.average_speed_mph)
    }

    pub fn eta_minutes_at(&self, average_speed_mph: f64) -> u32 {
        geo::eta_minutes(self.distance_miles(), average_speed_mph)
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            tick: self.ticks,
            state: self.state,
            distance_miles: self.distance_miles(),
            eta_minutes: self.eta_minutes(),
            arrived: self.has_arrived(),
        }
    }
}
