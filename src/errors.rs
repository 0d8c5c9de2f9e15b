// Error types for lifeline

use crate::{sos::SosSession, tracking::TrackingSnapshot};
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum LifelineError {
    // Errors for the alert tone device
    #[snafu(display("No audio output device available"))]
    NoAudioDevice,
    #[snafu(display("Audio device error: {description}"))]
    AudioDeviceError { description: String },
    #[snafu(display("Error writing alert to terminal"))]
    TerminalBellError { source: io::Error },

    // Errors for the user position source
    #[snafu(display("Location sensor unavailable: {reason}"))]
    SensorUnavailable { reason: String },
    #[snafu(display("Position source error: {description}"))]
    PositionSourceError { description: String },
    #[snafu(display("Error loading positions file"))]
    PositionLoaderError { source: io::Error },

    // Errors while broadcasting snapshots
    #[snafu(display("Error broadcasting SOS session snapshot"))]
    SessionBroadcastError { source: Box<SendError<SosSession>> },
    #[snafu(display("Error broadcasting tracking snapshot"))]
    TrackingBroadcastError {
        source: Box<SendError<TrackingSnapshot>>,
    },

    // Errors for the tracking recorder
    #[snafu(display("Error writing tracking file"))]
    WriterError { source: io::Error },
    #[snafu(display("Error serializing tracking snapshot"))]
    SnapshotSerializeError { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },
}

impl From<SendError<SosSession>> for LifelineError {
    fn from(value: SendError<SosSession>) -> Self {
        LifelineError::SessionBroadcastError {
            source: Box::new(value),
        }
    }
}

impl From<SendError<TrackingSnapshot>> for LifelineError {
    fn from(value: SendError<TrackingSnapshot>) -> Self {
        LifelineError::TrackingBroadcastError {
            source: Box::new(value),
        }
    }
}
