use serde::{Deserialize, Serialize};

use super::SosSession;

const EN_ROUTE_AFTER_S: u32 = 3;
const ARRIVING_AFTER_S: u32 = 8;
const ARRIVED_AFTER_S: u32 = 12;

/// Display stage shown while emergency services are on their way.
///
/// Derived only from the time elapsed since dispatch, not from the simulated vehicle
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchStage {
    Dispatched,
    EnRoute,
    Arriving,
    Arrived,
}

impl DispatchStage {
    pub const ALL: [DispatchStage; 4] = [
        DispatchStage::Dispatched,
        DispatchStage::EnRoute,
        DispatchStage::Arriving,
        DispatchStage::Arrived,
    ];

    pub fn from_elapsed(elapsed_since_dispatch: u32) -> Self {
        match elapsed_since_dispatch {
            e if e < EN_ROUTE_AFTER_S => DispatchStage::Dispatched,
            e if e < ARRIVING_AFTER_S => DispatchStage::EnRoute,
            e if e < ARRIVED_AFTER_S => DispatchStage::Arriving,
            _ => DispatchStage::Arrived,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DispatchStage::Dispatched => "dispatched",
            DispatchStage::EnRoute => "en-route",
            DispatchStage::Arriving => "arriving",
            DispatchStage::Arrived => "arrived",
        }
    }

    pub fn status_message(&self) -> &'static str {
        match self {
            DispatchStage::Dispatched => "Ambulance dispatched to your location",
            DispatchStage::EnRoute => "Ambulance is en route to you",
            DispatchStage::Arriving => "Ambulance is arriving soon",
            DispatchStage::Arrived => "Ambulance has arrived at your location",
        }
    }
}

impl std::fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Counts the seconds since dispatch on behalf of the tracking view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchTracker {
    elapsed_since_dispatch: u32,
}

impl DispatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues counting from a session that has already spent time dispatched.
    pub fn from_session(session: &SosSession) -> Self {
        Self {
            elapsed_since_dispatch: session.elapsed_since_dispatch,
        }
    }

    pub fn tick(&mut self) -> DispatchStage {
        self.elapsed_since_dispatch = self.elapsed_since_dispatch.saturating_add(1);
        self.stage()
    }

    pub fn elapsed_since_dispatch(&self) -> u32 {
        self.elapsed_since_dispatch
    }

    pub fn stage(&self) -> DispatchStage {
        DispatchStage::from_elapsed(self.elapsed_since_dispatch)
    }

    pub fn status_message(&self) -> &'static str {
        self.stage().status_message()
    }

    pub fn eta_label(&self, eta_minutes: u32) -> String {
        match self.stage() {
            DispatchStage::Arrived => "Arrived".to_string(),
            _ => format!("{} minutes", eta_minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_thresholds() {
        let cases = [
            (0, DispatchStage::Dispatched),
            (2, DispatchStage::Dispatched),
            (3, DispatchStage::EnRoute),
            (7, DispatchStage::EnRoute),
            (8, DispatchStage::Arriving),
            (11, DispatchStage::Arriving),
            (12, DispatchStage::Arrived),
            (100, DispatchStage::Arrived),
        ];
        for (elapsed, expected) in cases {
            assert_eq!(DispatchStage::from_elapsed(elapsed), expected, "elapsed {elapsed}");
        }
    }

    #[test]
    fn test_labels_are_kebab_case() {
        let labels: Vec<&str> = DispatchStage::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["dispatched", "en-route", "arriving", "arrived"]);
        assert_eq!(
            serde_json::to_string(&DispatchStage::EnRoute).unwrap(),
            "\"en-route\""
        );
    }

    #[test]
    fn test_tracker_walks_through_stages() {
        let mut tracker = DispatchTracker::new();
        assert_eq!(tracker.stage(), DispatchStage::Dispatched);
        assert_eq!(tracker.eta_label(3), "3 minutes");

        let stages: Vec<DispatchStage> = (0..12).map(|_| tracker.tick()).collect();
        assert_eq!(stages[1], DispatchStage::Dispatched);
        assert_eq!(stages[2], DispatchStage::EnRoute);
        assert_eq!(stages[7], DispatchStage::Arriving);
        assert_eq!(stages[11], DispatchStage::Arrived);

        assert_eq!(tracker.elapsed_since_dispatch(), 12);
        assert_eq!(tracker.eta_label(3), "Arrived");
        assert_eq!(
            tracker.status_message(),
            "Ambulance has arrived at your location"
        );
    }

    #[test]
    fn test_tracker_resumes_from_session() {
        let mut session = SosSession::new();
        session.elapsed_since_dispatch = 9;
        assert_eq!(
            DispatchTracker::from_session(&session).stage(),
            DispatchStage::Arriving
        );
    }
}
