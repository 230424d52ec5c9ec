//! Shared rig for connection manager scenarios.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use active::TickSource;
use netmgr::sim::{SimTelemetry, SimWifi};
use netmgr::{Collaborators, ConnectionManager, ManagerConfig, MemoryConfig, MemoryKnownNetworks};

pub type Transitions = Arc<Mutex<Vec<(&'static str, &'static str)>>>;

/// Manual ticks covering the rig's poll interval.
pub const POLL_TICKS: u64 = 5;

pub struct Rig {
    pub wifi: SimWifi,
    pub networks: MemoryKnownNetworks,
    pub config: Arc<MemoryConfig>,
    pub telemetry: SimTelemetry,
    pub transitions: Transitions,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            wifi: SimWifi::new(),
            networks: MemoryKnownNetworks::new(),
            config: Arc::new(MemoryConfig::new()),
            telemetry: SimTelemetry::new(),
            transitions: Arc::default(),
        }
    }

    pub fn manager_config() -> ManagerConfig {
        ManagerConfig::builder()
            .name("test manager")
            .poll_interval(Duration::from_millis(500))
            .tick_source(TickSource::Manual)
            .build()
    }

    pub fn start(&self) -> ConnectionManager {
        self.start_with(Self::manager_config())
    }

    /// Fresh handles onto the rig's simulators.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            wifi: Box::new(self.wifi.clone()),
            networks: Box::new(self.networks.clone()),
            config: self.config.clone(),
            telemetry: Box::new(self.telemetry.clone()),
        }
    }

    pub fn start_with(&self, config: ManagerConfig) -> ConnectionManager {
        let sink = Arc::clone(&self.transitions);
        ConnectionManager::start_with_hook(
            self.collaborators(),
            config,
            Some(Arc::new(move |from, to| sink.lock().unwrap().push((from, to)))),
        )
        .expect("manager should start")
    }

    /// Started and initialised, with auto-connect off.
    pub fn ready(&self) -> ConnectionManager {
        let manager = self.start();
        assert_eq!(manager.initialize(true), netmgr::ResultCode::Ok);
        manager
    }

    pub fn transitions(&self) -> Vec<(&'static str, &'static str)> {
        self.transitions.lock().unwrap().clone()
    }

    /// States entered so far, in order.
    pub fn entered(&self) -> Vec<&'static str> {
        self.transitions().into_iter().map(|(_, to)| to).collect()
    }

    pub fn wait_for_entries(&self, count: usize) {
        wait_until(|| self.transitions.lock().unwrap().len() >= count, "transitions");
    }
}

pub fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Waits until the retry timer is armed, which happens in the `PAUSING`
/// entry action right after the state name changes.
pub fn wait_for_retry_armed(manager: &ConnectionManager) {
    wait_until(|| manager.timers().armed_count() == 1, "retry timer");
}

pub fn wait_for_state(manager: &ConnectionManager, expected: &str) {
    wait_until(
        || manager.current_state_name() == expected,
        &format!("state {expected} (still {})", manager.current_state_name()),
    );
}
