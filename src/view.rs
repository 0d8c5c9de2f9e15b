// Plain-text rendering of the SOS countdown and the dispatch tracking screen

use itertools::Itertools;

use crate::{
    config::{EmergencyContact, ResponseTeam},
    geo::MapProjection,
    sos::{DispatchStage, DispatchTracker, SosPhase, SosSession},
    tracking::TrackingSnapshot,
};

pub fn render_sos(session: &SosSession, contacts: &[EmergencyContact]) -> String {
    match session.phase {
        SosPhase::Warning => {
            let notified = contacts
                .iter()
                .filter(|c| session.is_notified(&c.id))
                .map(|c| format!("{} {}", c.icon, c.name))
                .join(", ");
            format!(
                "EMERGENCY SOS ACTIVATED  {:02}s until emergency dispatch (Ctrl-C to cancel) \
                 | notifying: {}",
                session.seconds_remaining_in_phase, notified
            )
        }
        SosPhase::Triggered => format!(
            "Dispatching emergency services, connecting you with nearest responders... {} seconds",
            session.seconds_remaining_in_phase
        ),
        SosPhase::Dispatched => "Emergency services dispatched".to_string(),
    }
}

/// One status line for the tracking view, e.g.
/// `[en-route] Ambulance is en route to you | Rescue Unit 7 | ETA 1 minutes | 0.4 miles away`.
pub fn render_tracking(
    snapshot: &TrackingSnapshot,
    tracker: &DispatchTracker,
    team: &ResponseTeam,
) -> String {
    let vehicle = &snapshot.state.vehicle_position;
    let projection = MapProjection::centered(&snapshot.state.user_position, vehicle);
    let (vehicle_x, vehicle_y) = projection.project(vehicle);
    format!(
        "[{}] {} | {} | ETA {} | {:.1} miles away | ambulance at ({:.5}, {:.5}) \
         map offset ({:+.0}, {:+.0})",
        tracker.stage(),
        tracker.status_message(),
        team.unit,
        tracker.eta_label(snapshot.eta_minutes),
        snapshot.distance_miles,
        vehicle.latitude,
        vehicle.longitude,
        vehicle_x,
        vehicle_y,
    )
}

pub fn render_arrival(team: &ResponseTeam) -> String {
    format!(
        "Help Has Arrived! The ambulance team is here to assist you. Our paramedics {} are \
         ready to provide emergency care. Unit: {}",
        team.crew, team.unit
    )
}

/// Dispatch progress as a checklist: done stages are ticked, the current one is marked.
pub fn render_timeline(stage: DispatchStage) -> String {
    DispatchStage::ALL
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let marker = if *s == stage {
                "●".to_string()
            } else if *s < stage {
                "✓".to_string()
            } else {
                (idx + 1).to_string()
            };
            format!("{} {}", marker, s.label().replace('-', " "))
        })
        .join("  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::default_contacts,
        sos::{ContactId, SosRun},
        tracking::LocationSimulator,
    };

    #[test]
    fn test_warning_lists_selected_contacts() {
        let mut session = SosSession::new();
        session.toggle_contact(ContactId::new("3"));
        let line = render_sos(&session, &default_contacts());

        assert!(line.contains("10s until emergency dispatch"));
        assert!(line.contains("Emergency Dispatch"));
        assert!(line.contains("Friend - John"));
        assert!(!line.contains("Family - Mom"));
    }

    #[test]
    fn test_triggered_countdown() {
        let triggered = SosRun::default().nth(10).unwrap();
        assert_eq!(
            render_sos(&triggered, &[]),
            "Dispatching emergency services, connecting you with nearest responders... 3 seconds"
        );
    }

    #[test]
    fn test_tracking_line() {
        let snapshot = LocationSimulator::default().snapshot();
        let line = render_tracking(&snapshot, &DispatchTracker::new(), &ResponseTeam::default());
        assert!(line.starts_with("[dispatched] Ambulance dispatched to your location"));
        assert!(line.contains("| Rescue Unit 7 |"));
        assert!(line.contains("ETA 1 minutes"));
        assert!(line.contains("0.6 miles away"));
        assert!(line.contains(") map offset ("));
    }

    #[test]
    fn test_arrival_names_crew_and_unit() {
        let team = ResponseTeam {
            unit: "Medic 12".to_string(),
            crew: "Paramedics Lee & Patel".to_string(),
        };
        let message = render_arrival(&team);
        assert!(message.starts_with("Help Has Arrived!"));
        assert!(message.contains("Our paramedics Paramedics Lee & Patel are ready"));
        assert!(message.ends_with("Unit: Medic 12"));
    }

    #[test]
    fn test_timeline_marks_progress() {
        assert_eq!(
            render_timeline(DispatchStage::Arriving),
            "✓ dispatched  ✓ en route  ● arriving  4 arrived"
        );
        assert_eq!(
            render_timeline(DispatchStage::Dispatched),
            "● dispatched  2 en route  3 arriving  4 arrived"
        );
    }
}
