//! Telemetry client interface.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("telemetry client initialization failed: {0}")]
    InitFailed(String),
    #[error("telemetry client failed to start: {0}")]
    StartFailed(String),
}

/// Publisher that only runs while the station is connected.
pub trait TelemetryClient: Send {
    fn init(&mut self) -> Result<(), TelemetryError>;

    fn start(&mut self) -> Result<(), TelemetryError>;

    fn stop(&mut self);
}
