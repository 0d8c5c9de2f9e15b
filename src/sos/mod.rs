pub mod dispatch;
pub(crate) mod driver;
pub mod tone;

use std::collections::BTreeSet;

pub use dispatch::{DispatchStage, DispatchTracker};
pub use driver::{SosControl, SosRun, SosStream, start_session, start_sos};
use serde::{Deserialize, Serialize};

/// Seconds the user has to cancel before the alert is triggered.
pub const WARNING_SECONDS: u32 = 10;
/// Seconds between triggering and dispatching emergency services.
pub const TRIGGERED_SECONDS: u32 = 3;
/// Identifier of the emergency dispatch contact, which is always notified.
pub const DISPATCH_CONTACT_ID: &str = "dispatch";

/// Opaque reference to an entry of the externally supplied emergency contact list.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn dispatch() -> Self {
        Self::new(DISPATCH_CONTACT_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_dispatch(&self) -> bool {
        self.0 == DISPATCH_CONTACT_ID
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an SOS alert. Phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SosPhase {
    /// Cancellable countdown
    Warning,
    /// Alert confirmed, connecting to responders
    Triggered,
    /// Emergency services dispatched
    Dispatched,
}

impl std::fmt::Display for SosPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SosPhase::Warning => write!(f, "Warning"),
            SosPhase::Triggered => write!(f, "Triggered"),
            SosPhase::Dispatched => write!(f, "Dispatched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SosEvent {
    /// One second elapsed
    Tick,
    /// The user aborted the alert
    Cancel,
    ToggleContact(ContactId),
}

/// Side effects requested by a transition, to be carried out by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SosEffect {
    /// Play the short audible alert
    AlertTone,
    /// Emergency services were dispatched; fires once per session
    Dispatched,
    /// The session was discarded during the warning countdown
    Cancelled,
}

/// State of one emergency activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SosSession {
    pub phase: SosPhase,
    pub seconds_remaining_in_phase: u32,
    /// Whole seconds since the session became [`SosPhase::Dispatched`]
    pub elapsed_since_dispatch: u32,
    notify_contacts: BTreeSet<ContactId>,
}

impl Default for SosSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SosSession {
    pub fn new() -> Self {
        Self {
            phase: SosPhase::Warning,
            seconds_remaining_in_phase: WARNING_SECONDS,
            elapsed_since_dispatch: 0,
            notify_contacts: BTreeSet::from([ContactId::dispatch()]),
        }
    }

    pub fn is_dispatched(&self) -> bool {
        self.phase == SosPhase::Dispatched
    }

    pub fn can_cancel(&self) -> bool {
        self.phase == SosPhase::Warning
    }

    /// Contacts that will be notified, always including dispatch.
    pub fn notify_contacts(&self) -> &BTreeSet<ContactId> {
        &self.notify_contacts
    }

    pub fn is_notified(&self, id: &ContactId) -> bool {
        self.notify_contacts.contains(id)
    }

    /// Adds or removes a contact from the notify set. Dispatch cannot be removed.
    pub fn toggle_contact(&mut self, id: ContactId) {
        if id.is_dispatch() {
            return;
        }
        if !self.notify_contacts.remove(&id) {
            self.notify_contacts.insert(id);
        }
    }

    /// Applies one event and returns the new session alongside the effects to perform.
    ///
    /// Returns `None` as the session when the event discards it (cancellation during the
    /// warning countdown).
    pub fn apply(mut self, event: SosEvent) -> (Option<SosSession>, Vec<SosEffect>) {
        match event {
            SosEvent::Tick => {
                let effects = self.tick();
                (Some(self), effects)
            }
            SosEvent::Cancel if self.can_cancel() => (None, vec![SosEffect::Cancelled]),
            SosEvent::Cancel => (Some(self), Vec::new()),
            SosEvent::ToggleContact(id) => {
                self.toggle_contact(id);
                (Some(self), Vec::new())
            }
        }
    }

    fn tick(&mut self) -> Vec<SosEffect> {
        match self.phase {
            SosPhase::Warning => {
                self.seconds_remaining_in_phase = self.seconds_remaining_in_phase.saturating_sub(1);
                if self.seconds_remaining_in_phase == 0 {
                    self.phase = SosPhase::Triggered;
                    self.seconds_remaining_in_phase = TRIGGERED_SECONDS;
                }
                vec![SosEffect::AlertTone]
            }
            SosPhase::Triggered => {
                self.seconds_remaining_in_phase = self.seconds_remaining_in_phase.saturating_sub(1);
                if self.seconds_remaining_in_phase == 0 {
                    self.phase = SosPhase::Dispatched;
                    vec![SosEffect::Dispatched]
                } else {
                    vec![SosEffect::AlertTone]
                }
            }
            SosPhase::Dispatched => {
                self.elapsed_since_dispatch = self.elapsed_since_dispatch.saturating_add(1);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tick(session: SosSession) -> (SosSession, Vec<SosEffect>) {
        let (session, effects) = session.apply(SosEvent::Tick);
        (session.expect("ticks never discard a session"), effects)
    }

    #[test]
    fn test_new_session_starts_in_warning() {
        let session = SosSession::new();
        assert_eq!(session.phase, SosPhase::Warning);
        assert_eq!(session.seconds_remaining_in_phase, 10);
        assert_eq!(session.elapsed_since_dispatch, 0);
        assert!(session.is_notified(&ContactId::dispatch()));
        assert_eq!(session.notify_contacts().len(), 1);
    }

    #[test]
    fn test_full_sequence_dispatches_on_thirteenth_tick() {
        let mut session = SosSession::new();
        let mut phases = Vec::new();
        let mut tones = 0;
        let mut dispatched_at = None;

        for n in 1..=13 {
            phases.push(session.phase);
            let (next, effects) = tick(session);
            session = next;
            tones += effects.iter().filter(|e| **e == SosEffect::AlertTone).count();
            if effects.contains(&SosEffect::Dispatched) {
                assert!(dispatched_at.is_none());
                dispatched_at = Some(n);
            }
        }

        assert_eq!(dispatched_at, Some(13));
        assert_eq!(&phases[..10], &[SosPhase::Warning; 10]);
        assert_eq!(&phases[10..], &[SosPhase::Triggered; 3]);
        assert_eq!(session.phase, SosPhase::Dispatched);
        // ten warning tones (the last one on the boundary) plus two triggered tones
        assert_eq!(tones, 12);
    }

    #[test]
    fn test_warning_boundary_resets_to_triggered_countdown() {
        let mut session = SosSession::new();
        for _ in 0..9 {
            session = tick(session).0;
        }
        assert_eq!(session.phase, SosPhase::Warning);
        assert_eq!(session.seconds_remaining_in_phase, 1);

        let (session, effects) = tick(session);
        assert_eq!(session.phase, SosPhase::Triggered);
        assert_eq!(session.seconds_remaining_in_phase, 3);
        assert_eq!(effects, vec![SosEffect::AlertTone]);
    }

    #[test]
    fn test_dispatched_is_terminal() {
        let mut session = SosSession::new();
        for _ in 0..13 {
            session = tick(session).0;
        }
        for expected_elapsed in 1..=20 {
            let (next, effects) = tick(session);
            session = next;
            assert!(effects.is_empty());
            assert_eq!(session.phase, SosPhase::Dispatched);
            assert_eq!(session.elapsed_since_dispatch, expected_elapsed);
        }
    }

    #[test]
    fn test_cancel_only_in_warning() {
        let (cancelled, effects) = SosSession::new().apply(SosEvent::Cancel);
        assert!(cancelled.is_none());
        assert_eq!(effects, vec![SosEffect::Cancelled]);

        let mut session = SosSession::new();
        for _ in 0..10 {
            session = tick(session).0;
        }
        let (kept, effects) = session.clone().apply(SosEvent::Cancel);
        assert_eq!(kept, Some(session));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_toggle_contacts() {
        let mom = ContactId::new("2");
        let mut session = SosSession::new();

        session.toggle_contact(mom.clone());
        assert!(session.is_notified(&mom));
        session.toggle_contact(mom.clone());
        assert!(!session.is_notified(&mom));

        session.toggle_contact(ContactId::dispatch());
        assert!(session.is_notified(&ContactId::dispatch()));

        let (session, effects) = session.apply(SosEvent::ToggleContact(mom.clone()));
        let session = session.unwrap();
        assert!(effects.is_empty());
        assert!(session.is_notified(&mom));
        assert_eq!(session.seconds_remaining_in_phase, WARNING_SECONDS);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_cancel_before_tenth_tick_never_dispatches(cancel_after in 0usize..10) {
            let mut session = SosSession::new();
            for _ in 0..cancel_after {
                session = tick(session).0;
            }
            let (discarded, effects) = session.apply(SosEvent::Cancel);
            prop_assert!(discarded.is_none());
            prop_assert!(!effects.contains(&SosEffect::Dispatched));
        }

        #[test]
        fn prop_phases_are_monotonic(ticks in 0usize..40) {
            let mut session = SosSession::new();
            let mut previous = session.phase;
            for _ in 0..ticks {
                session = tick(session).0;
                prop_assert!(session.phase >= previous);
                previous = session.phase;
            }
        }
    }
}
