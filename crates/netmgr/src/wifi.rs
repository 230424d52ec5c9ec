//! Wi-Fi driver interface.

use std::time::Duration;

use thiserror::Error;

use crate::types::{Credentials, ScanRecord};

/// Invoked by the driver, on any thread, when the station loses its link.
pub type DisconnectCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WifiError {
    #[error("wifi initialization failed")]
    InitFailed,
    #[error("wifi scan failed")]
    ScanFailed,
    #[error("could not connect to `{0}`")]
    ConnectFailed(String),
    #[error("no connection within {0:?}")]
    ConnectionTimeout(Duration),
    #[error("no scan record at index {0}")]
    InvalidRecordIndex(usize),
}

/// Station-mode radio driver.
///
/// Only the connection manager's executor calls these methods, so an
/// implementation needs no locking unless it is shared elsewhere. The
/// disconnect callback is the exception: the driver may invoke it from
/// its own event thread.
pub trait WifiDriver: Send {
    fn init(&mut self) -> Result<(), WifiError>;

    /// Runs a blocking scan and keeps its results for enumeration.
    fn scan(&mut self) -> Result<(), WifiError>;

    /// Number of access points found by the last scan.
    fn scan_count(&self) -> usize;

    fn scan_record(&self, index: usize) -> Result<ScanRecord, WifiError>;

    /// Blocks until associated or `timeout` elapses.
    fn connect(&mut self, credentials: &Credentials, timeout: Duration) -> Result<(), WifiError>;

    fn disconnect(&mut self);

    /// Registers the callback for link loss. Replaces any earlier one.
    fn on_disconnect(&mut self, callback: DisconnectCallback) -> Result<(), WifiError>;
}
