use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::LifelineError;

use super::{
    ContactId, SosEffect, SosEvent, SosSession, TRIGGERED_SECONDS, WARNING_SECONDS,
    tone::{LazyTone, ToneDevice, sound_alert},
};

/// Runs a session to completion without waiting between ticks.
///
/// Yields the starting session, then the session after every tick, and stops after the tick
/// that dispatches. Effects are not performed; use [`start_sos`] for a timed run with tones and
/// the dispatch callback.
#[derive(Debug, Clone)]
pub struct SosRun {
    session: Option<SosSession>,
    started: bool,
}

impl SosRun {
    pub fn new(session: SosSession) -> Self {
        Self {
            session: Some(session),
            started: false,
        }
    }

    /// Discards the session if it is still in the warning countdown.
    pub fn cancel(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                let (session, _) = session.apply(SosEvent::Cancel);
                let cancelled = session.is_none();
                self.session = session;
                cancelled
            }
            None => false,
        }
    }

    pub fn toggle_contact(&mut self, id: ContactId) {
        if let Some(session) = self.session.as_mut() {
            session.toggle_contact(id);
        }
    }
}

impl Default for SosRun {
    fn default() -> Self {
        Self::new(SosSession::new())
    }
}

impl Iterator for SosRun {
    type Item = SosSession;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            return self.session.clone();
        }
        let session = self.session.take()?;
        if session.is_dispatched() {
            return None;
        }
        let (session, _) = session.apply(SosEvent::Tick);
        self.session = session.clone();
        session
    }
}

enum Control {
    Event(SosEvent),
    Shutdown,
}

/// Sends control events to a running SOS session.
#[derive(Clone)]
pub struct SosControl {
    sender: Sender<Control>,
}

impl SosControl {
    /// Requests cancellation. Ignored once the warning countdown is over.
    pub fn cancel(&self) {
        self.send(SosEvent::Cancel);
    }

    pub fn toggle_contact(&self, id: ContactId) {
        self.send(SosEvent::ToggleContact(id));
    }

    fn send(&self, event: SosEvent) {
        if let Err(mpsc::SendError(Control::Event(event))) =
            self.sender.send(Control::Event(event))
        {
            debug!("SOS session already finished, dropping {:?}", event);
        }
    }
}

/// Finite stream of session snapshots, one per tick, ending at dispatch or cancellation.
pub struct SosStream {
    receiver: Receiver<SosSession>,
    control: SosControl,
    alive: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SosStream {
    pub fn control(&self) -> SosControl {
        self.control.clone()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn toggle_contact(&self, id: ContactId) {
        self.control.toggle_contact(id);
    }
}

impl Iterator for SosStream {
    type Item = SosSession;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl Drop for SosStream {
    fn drop(&mut self) {
        // a pending tick must not touch the session once the consumer is gone
        self.alive.store(false, Ordering::SeqCst);
        // wakes the worker if it is waiting for the next tick
        let _ = self.control.sender.send(Control::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("SOS worker panicked");
            }
        }
    }
}

/// Starts a new SOS session on a dedicated thread.
///
/// `make_device` builds the alert tone device the first time a tone is needed; failures are
/// logged and the countdown continues silently. `on_dispatched` runs exactly once, when the
/// session reaches dispatch, and never if the session is cancelled or the stream dropped
/// first.
pub fn start_sos<D, M, C>(make_device: M, on_dispatched: C, tick_interval: Duration) -> SosStream
where
    D: ToneDevice,
    M: FnMut() -> Result<D, LifelineError> + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    start_session(SosSession::new(), make_device, on_dispatched, tick_interval)
}

/// Same as [`start_sos`], starting from a prepared session (e.g. with contacts already
/// selected). The session is emitted as-is before the first tick.
pub fn start_session<D, M, C>(
    session: SosSession,
    make_device: M,
    on_dispatched: C,
    tick_interval: Duration,
) -> SosStream
where
    D: ToneDevice,
    M: FnMut() -> Result<D, LifelineError> + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    let (snapshot_tx, snapshot_rx) = mpsc::channel::<SosSession>();
    let (control_tx, control_rx) = mpsc::channel::<Control>();
    let alive = Arc::new(AtomicBool::new(true));

    let worker_alive = alive.clone();
    let worker = thread::spawn(move || {
        let tone = LazyTone::new(make_device);
        if let Err(e) = run_sos(
            session,
            tone,
            on_dispatched,
            tick_interval,
            &worker_alive,
            control_rx,
            snapshot_tx,
        ) {
            debug!("SOS loop ended: {}", e);
        }
    });

    SosStream {
        receiver: snapshot_rx,
        control: SosControl { sender: control_tx },
        alive,
        worker: Some(worker),
    }
}

fn run_sos(
    mut session: SosSession,
    mut tone: impl ToneDevice,
    on_dispatched: impl FnOnce(),
    tick_interval: Duration,
    alive: &AtomicBool,
    control_receiver: Receiver<Control>,
    snapshot_sender: Sender<SosSession>,
) -> Result<(), LifelineError> {
    let mut on_dispatched = Some(on_dispatched);
    info!(
        "SOS started, dispatching in {}s unless cancelled",
        WARNING_SECONDS + TRIGGERED_SECONDS
    );
    snapshot_sender.send(session.clone())?;

    // each tick is armed relative to the completion of the previous one
    let mut next_tick = Instant::now() + tick_interval;
    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        let event = match control_receiver.recv_timeout(wait) {
            Ok(Control::Event(event)) => event,
            Err(RecvTimeoutError::Timeout) => SosEvent::Tick,
            Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                debug!("SOS consumer went away");
                return Ok(());
            }
        };
        if !alive.load(Ordering::SeqCst) {
            debug!("SOS session torn down, dropping pending {:?}", event);
            return Ok(());
        }

        let is_tick = event == SosEvent::Tick;
        let (next, effects) = session.apply(event);
        for effect in effects {
            match effect {
                SosEffect::AlertTone => sound_alert(&mut tone),
                SosEffect::Dispatched => {
                    info!("Emergency services dispatched");
                    if let Some(callback) = on_dispatched.take() {
                        callback();
                    }
                }
                SosEffect::Cancelled => info!("SOS cancelled by user"),
            }
        }

        let Some(next) = next else {
            return Ok(());
        };
        session = next;

        if is_tick {
            debug!(
                "SOS {} with {}s remaining",
                session.phase, session.seconds_remaining_in_phase
            );
            snapshot_sender.send(session.clone())?;
            if session.is_dispatched() {
                return Ok(());
            }
            next_tick = Instant::now() + tick_interval;
        }
    }
}
