//! Simulated collaborators for hosts without a radio.
//!
//! Every simulator is a cheap handle around shared state: keep one clone to
//! steer and inspect it while the manager owns another.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::telemetry::{TelemetryClient, TelemetryError};
use crate::types::{Credentials, ScanRecord};
use crate::wifi::{DisconnectCallback, WifiDriver, WifiError};

type SharedCallback = Arc<dyn Fn() + Send + Sync>;

/// An access point the simulated radio can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimAccessPoint {
    pub credentials: Credentials,
    pub rssi: i8,
}

/// Call counters of a [`SimWifi`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimWifiStats {
    pub inits: usize,
    pub scans: usize,
    pub connects: usize,
    pub disconnects: usize,
}

#[derive(Default)]
struct SimWifiState {
    access_points: Vec<SimAccessPoint>,
    last_scan: Vec<ScanRecord>,
    connected: Option<Credentials>,
    callback: Option<SharedCallback>,
    fail_init: bool,
    fail_scan: bool,
    fail_connect: bool,
    scan_delay: Duration,
    connect_delay: Duration,
    stats: SimWifiStats,
}

/// Simulated station-mode radio.
///
/// Scans report visible access points strongest first. A connect succeeds
/// when the SSID is visible and the passphrase matches; an invisible SSID
/// times out.
#[derive(Clone, Default)]
pub struct SimWifi {
    state: Arc<Mutex<SimWifiState>>,
}

impl SimWifi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `ssid` visible, replacing any access point with the same SSID.
    pub fn add_access_point(&self, ssid: &str, password: &str, rssi: i8) {
        let credentials = Credentials::new(ssid, password);
        let mut state = self.state.lock();
        state
            .access_points
            .retain(|ap| ap.credentials.ssid() != credentials.ssid());
        state.access_points.push(SimAccessPoint { credentials, rssi });
    }

    /// Hides `ssid`, dropping the link if the station was joined to it.
    pub fn remove_access_point(&self, ssid: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.access_points.len();
        state.access_points.retain(|ap| !ap.credentials.matches_ssid(ssid));
        let removed = state.access_points.len() != before;
        let joined = state
            .connected
            .as_ref()
            .is_some_and(|current| current.matches_ssid(ssid));
        drop(state);
        if joined {
            self.drop_link();
        }
        removed
    }

    pub fn access_points(&self) -> Vec<SimAccessPoint> {
        self.state.lock().access_points.clone()
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.state.lock().fail_init = fail;
    }

    pub fn set_fail_scan(&self, fail: bool) {
        self.state.lock().fail_scan = fail;
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    /// Time a scan takes. The scan counter moves before the delay.
    pub fn set_scan_delay(&self, delay: Duration) {
        self.state.lock().scan_delay = delay;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().connect_delay = delay;
    }

    pub fn connected_ssid(&self) -> Option<String> {
        self.state
            .lock()
            .connected
            .as_ref()
            .map(|credentials| credentials.ssid().to_string())
    }

    pub fn stats(&self) -> SimWifiStats {
        self.state.lock().stats
    }

    /// Loses the link as if the access point went away, firing the
    /// disconnect callback. Returns whether the station was connected.
    pub fn drop_link(&self) -> bool {
        let mut state = self.state.lock();
        let was_connected = state.connected.take().is_some();
        let callback = state.callback.clone();
        drop(state);

        if was_connected {
            log::info!("sim wifi: link dropped");
            if let Some(callback) = callback {
                callback();
            }
        }
        was_connected
    }
}

impl WifiDriver for SimWifi {
    fn init(&mut self) -> Result<(), WifiError> {
        let mut state = self.state.lock();
        state.stats.inits += 1;
        if state.fail_init {
            return Err(WifiError::InitFailed);
        }
        Ok(())
    }

    fn scan(&mut self) -> Result<(), WifiError> {
        let mut state = self.state.lock();
        state.stats.scans += 1;
        let delay = state.scan_delay;
        drop(state);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if state.fail_scan {
            state.last_scan.clear();
            return Err(WifiError::ScanFailed);
        }
        let mut found: Vec<ScanRecord> = state
            .access_points
            .iter()
            .map(|ap| ScanRecord::new(ap.credentials.ssid(), ap.rssi))
            .collect();
        found.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        log::debug!("sim wifi: scan found {} access points", found.len());
        state.last_scan = found;
        Ok(())
    }

    fn scan_count(&self) -> usize {
        self.state.lock().last_scan.len()
    }

    fn scan_record(&self, index: usize) -> Result<ScanRecord, WifiError> {
        self.state
            .lock()
            .last_scan
            .get(index)
            .cloned()
            .ok_or(WifiError::InvalidRecordIndex(index))
    }

    fn connect(&mut self, credentials: &Credentials, timeout: Duration) -> Result<(), WifiError> {
        let mut state = self.state.lock();
        state.stats.connects += 1;
        let delay = state.connect_delay;
        drop(state);
        if !delay.is_zero() {
            thread::sleep(delay.min(timeout));
            if delay > timeout {
                return Err(WifiError::ConnectionTimeout(timeout));
            }
        }

        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(WifiError::ConnectFailed(credentials.ssid().into()));
        }
        let Some(ap) = state
            .access_points
            .iter()
            .find(|ap| ap.credentials.ssid() == credentials.ssid())
        else {
            return Err(WifiError::ConnectionTimeout(timeout));
        };
        if ap.credentials.password() != credentials.password() {
            return Err(WifiError::ConnectFailed(credentials.ssid().into()));
        }
        state.connected = Some(credentials.clone());
        Ok(())
    }

    /// Like the real driver, a manual disconnect also raises the
    /// disconnect event.
    fn disconnect(&mut self) {
        self.state.lock().stats.disconnects += 1;
        self.drop_link();
    }

    fn on_disconnect(&mut self, callback: DisconnectCallback) -> Result<(), WifiError> {
        self.state.lock().callback = Some(Arc::from(callback));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SimTelemetryState {
    initialized: bool,
    running: bool,
    starts: usize,
    stops: usize,
    fail_init: bool,
    fail_start: bool,
}

/// Simulated telemetry client that only records its lifecycle.
#[derive(Debug, Clone, Default)]
pub struct SimTelemetry {
    state: Arc<Mutex<SimTelemetryState>>,
}

impl SimTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.state.lock().fail_init = fail;
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.state.lock().fail_start = fail;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn starts(&self) -> usize {
        self.state.lock().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }
}

impl TelemetryClient for SimTelemetry {
    fn init(&mut self) -> Result<(), TelemetryError> {
        let mut state = self.state.lock();
        if state.fail_init {
            return Err(TelemetryError::InitFailed("broker address not configured".into()));
        }
        state.initialized = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), TelemetryError> {
        let mut state = self.state.lock();
        if state.fail_start {
            return Err(TelemetryError::StartFailed("broker unreachable".into()));
        }
        state.starts += 1;
        state.running = true;
        log::info!("sim telemetry: started");
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.stops += 1;
        state.running = false;
        log::info!("sim telemetry: stopped");
    }
}
