use std::{
    path::Path,
    sync::mpsc::{Receiver, TryRecvError},
};

use log::debug;

use crate::{LifelineError, geo::GeoPoint};

/// Supplies live user positions, typically from a device location sensor.
///
/// Sources report at their own cadence. The tracking loop polls once per tick and only keeps
/// the most recent reading.
pub trait PositionSource {
    /// Prepares the source. A failure here means the sensor is unavailable or permission was
    /// denied, and tracking carries on with the last known position.
    fn start(&mut self) -> Result<(), LifelineError>;

    /// Returns the latest reading since the previous poll, if any. Must not block.
    fn poll(&mut self) -> Result<Option<GeoPoint>, LifelineError>;
}

/// A source for hosts without a location sensor.
#[derive(Debug, Default)]
pub struct UnavailablePositionSource;

impl PositionSource for UnavailablePositionSource {
    fn start(&mut self) -> Result<(), LifelineError> {
        Err(LifelineError::SensorUnavailable {
            reason: "no location sensor on this host".to_string(),
        })
    }

    fn poll(&mut self) -> Result<Option<GeoPoint>, LifelineError> {
        Ok(None)
    }
}

/// Receives positions pushed from another thread, for example a platform geolocation watcher.
pub struct ChannelPositionSource {
    receiver: Receiver<GeoPoint>,
    disconnected: bool,
}

impl ChannelPositionSource {
    pub fn new(receiver: Receiver<GeoPoint>) -> Self {
        Self {
            receiver,
            disconnected: false,
        }
    }
}

impl PositionSource for ChannelPositionSource {
    fn start(&mut self) -> Result<(), LifelineError> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<GeoPoint>, LifelineError> {
        if self.disconnected {
            return Ok(None);
        }

        // drain everything queued since the last tick and keep only the freshest reading
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(point) => latest = Some(point),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    if latest.is_some() {
                        return Ok(latest);
                    }
                    return Err(LifelineError::SensorUnavailable {
                        reason: "position channel closed".to_string(),
                    });
                }
            }
        }
    }
}

/// Replays a recorded list of positions, one per poll. Once exhausted it reports no new
/// readings.
#[derive(Debug, Default)]
pub struct ReplayPositionSource {
    points: Vec<GeoPoint>,
    cur_tick: usize,
}

impl ReplayPositionSource {
    pub fn from_points(points: Vec<GeoPoint>) -> Self {
        Self {
            points,
            cur_tick: 0,
        }
    }

    /// Load positions from a JSON Lines file with one [`GeoPoint`] per line.
    pub fn from_file(file: &Path) -> Result<Self, LifelineError> {
        let points = serde_jsonlines::json_lines(file)
            .map_err(|e| LifelineError::PositionLoaderError { source: e })?
            .collect::<Result<Vec<GeoPoint>, std::io::Error>>()
            .map_err(|e| LifelineError::PositionLoaderError { source: e })?;
        debug!("Loaded {} positions from {:?}", points.len(), file);
        Ok(Self::from_points(points))
    }

    pub fn remaining(&self) -> usize {
        self.points.len().saturating_sub(self.cur_tick)
    }
}

impl PositionSource for ReplayPositionSource {
    fn start(&mut self) -> Result<(), LifelineError> {
        if self.points.is_empty() {
            return Err(LifelineError::PositionSourceError {
                description: "replay source has no positions".to_string(),
            });
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<GeoPoint>, LifelineError> {
        let point = self.points.get(self.cur_tick).copied();
        if point.is_some() {
            self.cur_tick += 1;
        } else {
            debug!("Replay source exhausted after {} positions", self.points.len());
        }
        Ok(point)
    }
}
