use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, info, warn};

use crate::LifelineError;

use super::{LocationSimulator, PositionSource, TrackingSnapshot};

/// Infinite stream of tracking snapshots, one per tick.
///
/// The simulation runs on its own thread and stops as soon as the stream is stopped or
/// dropped.
pub struct TrackingStream {
    receiver: Receiver<TrackingSnapshot>,
    stop: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl TrackingStream {
    /// Stops the simulation. Snapshots already produced can still be drained.
    pub fn stop(&self) {
        // the worker may already be gone
        let _ = self.stop.send(());
    }
}

impl Iterator for TrackingStream {
    type Item = TrackingSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl Drop for TrackingStream {
    fn drop(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Tracking worker panicked");
            }
        }
    }
}

/// Starts a fresh tracking simulation from the simulator's current positions.
///
/// Every `tick_interval` the latest reading from `source` (if any) replaces the user position,
/// the vehicle takes one step and a snapshot is emitted. A source that cannot start or fails
/// to poll is logged and ignored; the simulation keeps running on the last known position.
pub fn observe_tracking(
    source: impl PositionSource + Send + 'static,
    simulator: LocationSimulator,
    tick_interval: Duration,
) -> TrackingStream {
    let (snapshot_tx, snapshot_rx) = mpsc::channel::<TrackingSnapshot>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let worker = thread::spawn(move || {
        if let Err(e) = run_tracking(source, simulator, tick_interval, stop_rx, snapshot_tx) {
            debug!("Tracking loop ended: {}", e);
        }
    });

    TrackingStream {
        receiver: snapshot_rx,
        stop: stop_tx,
        worker: Some(worker),
    }
}

fn run_tracking(
    mut source: impl PositionSource,
    mut simulator: LocationSimulator,
    tick_interval: Duration,
    stop_receiver: Receiver<()>,
    snapshot_sender: Sender<TrackingSnapshot>,
) -> Result<(), LifelineError> {
    if let Err(e) = source.start() {
        warn!("Position source unavailable, using last known position: {}", e);
    }
    info!(
        "Tracking started, vehicle {:.5} degrees from user",
        simulator.distance_degrees()
    );

    let mut was_arrived = simulator.has_arrived();
    loop {
        // re-armed only after the previous tick has been fully applied
        match stop_receiver.recv_timeout(tick_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("Tracking stopped, dropping pending tick");
                return Ok(());
            }
        }

        match source.poll() {
            Ok(Some(point)) => simulator.update_user_position(point),
            Ok(None) => {}
            Err(e) => warn!("Could not read user position: {}", e),
        }
        simulator.tick();

        let snapshot = simulator.snapshot();
        if snapshot.arrived && !was_arrived {
            info!("Vehicle reached the user after {} ticks", snapshot.tick);
        }
        was_arrived = snapshot.arrived;

        snapshot_sender.send(snapshot)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geo::GeoPoint,
        tracking::{ChannelPositionSource, ReplayPositionSource, UnavailablePositionSource},
    };

    const FAST_TICK: Duration = Duration::from_millis(1);

    #[test]
    fn test_stream_emits_sequential_ticks() {
        let stream = observe_tracking(
            UnavailablePositionSource,
            LocationSimulator::default(),
            FAST_TICK,
        );
        let snapshots: Vec<TrackingSnapshot> = stream.take(5).collect();

        assert_eq!(
            snapshots.iter().map(|s| s.tick).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        for pair in snapshots.windows(2) {
            assert!(pair[1].distance_miles <= pair[0].distance_miles);
        }
    }

    #[test]
    fn test_replayed_positions_replace_user_position() {
        let target = GeoPoint::new(42.37, -71.05).with_accuracy(20.);
        let source = ReplayPositionSource::from_points(vec![target]);
        let mut stream = observe_tracking(source, LocationSimulator::default(), FAST_TICK);

        let first = stream.next().unwrap();
        assert_eq!(first.state.user_position, target);
        let second = stream.next().unwrap();
        assert_eq!(second.state.user_position, target);
    }

    #[test]
    fn test_pushed_updates_faster_than_ticks() {
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            tx.send(GeoPoint::new(42.0 + i as f64 * 0.01, -71.)).unwrap();
        }
        let mut stream = observe_tracking(
            ChannelPositionSource::new(rx),
            LocationSimulator::default(),
            FAST_TICK,
        );

        let freshest = GeoPoint::new(42.0 + 9. * 0.01, -71.);
        let first = stream.next().unwrap();
        assert_eq!(first.state.user_position, freshest);

        // sensor going away leaves the last known position in place
        drop(tx);
        let later = stream.nth(3).unwrap();
        assert_eq!(later.state.user_position, freshest);
    }

    #[test]
    fn test_stop_ends_stream() {
        let mut stream = observe_tracking(
            UnavailablePositionSource,
            LocationSimulator::default(),
            FAST_TICK,
        );
        assert!(stream.next().is_some());
        stream.stop();
        // at most a handful of in-flight snapshots remain before the channel closes
        assert!(stream.by_ref().take(1000).count() < 1000);
    }

    #[test]
    fn test_fresh_call_starts_fresh_simulation() {
        let simulator = LocationSimulator::default();
        let first: Vec<_> =
            observe_tracking(UnavailablePositionSource, simulator.clone(), FAST_TICK)
                .take(3)
                .collect();
        let second: Vec<_> = observe_tracking(UnavailablePositionSource, simulator, FAST_TICK)
            .take(3)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_drop_does_not_wait_for_pending_tick() {
        let stream = observe_tracking(
            UnavailablePositionSource,
            LocationSimulator::default(),
            Duration::from_secs(5),
        );

        let started = std::time::Instant::now();
        drop(stream);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
