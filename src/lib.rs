// Library interface for lifeline
// This allows integration tests and benches to access internal modules

pub mod config;
pub mod errors;
pub mod geo;
pub mod sos;
pub mod tracking;
pub mod view;
pub mod writer;

// Re-export commonly used types
pub use config::{AppConfig, EmergencyContact};
pub use errors::LifelineError;
pub use geo::GeoPoint;
pub use sos::{
    ContactId, DispatchStage, DispatchTracker, SosPhase, SosRun, SosSession, SosStream,
    start_session, start_sos,
};
pub use tracking::{
    LocationSimulator, TrackingSnapshot, TrackingState, TrackingStream, observe_tracking,
};
