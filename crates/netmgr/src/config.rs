//! Runtime feature flags and manager sizing.
//!
//! [`ConfigStore`] answers the boolean flags the manager consults while it
//! runs (auto-connect after init, telemetry on connect). [`ManagerConfig`]
//! fixes everything decided once at start-up.

use std::collections::BTreeMap;
use std::time::Duration;

use active::{MachineConfig, TickSource};
use parking_lot::RwLock;

/// Connect automatically after a successful `Initialize`.
pub const NETWORK_AUTOCONNECT: &str = "network-autoconnect";
/// Start the telemetry client while connected.
pub const TELEMETRY_ENABLE: &str = "telemetry-enable";

/// Longest value accepted by [`MemoryConfig::set`].
pub const CONFIG_VALUE_MAX_LEN: usize = 63;

/// Read access to boolean settings.
pub trait ConfigStore: Send + Sync {
    /// Value of `key`; unknown keys and unparseable values read `false`.
    fn get_boolean(&self, key: &str) -> bool;
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Settings table held in memory. Only keys present in the default table
/// can be set.
#[derive(Debug)]
pub struct MemoryConfig {
    values: RwLock<BTreeMap<&'static str, String>>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::with_defaults(&[(NETWORK_AUTOCONNECT, "false"), (TELEMETRY_ENABLE, "false")])
    }
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: &[(&'static str, &str)]) -> Self {
        let values = defaults
            .iter()
            .map(|(key, value)| (*key, (*value).to_string()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    /// Stores `value` under `key`. Returns `false` for unknown keys and for
    /// values longer than [`CONFIG_VALUE_MAX_LEN`] bytes.
    pub fn set(&self, key: &str, value: &str) -> bool {
        if value.len() > CONFIG_VALUE_MAX_LEN {
            log::warn!("config value for `{key}` too long");
            return false;
        }
        match self.values.write().get_mut(key) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => {
                log::warn!("unknown config key `{key}`");
                false
            }
        }
    }

    pub fn set_boolean(&self, key: &str, value: bool) -> bool {
        self.set(key, if value { "true" } else { "false" })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// All `(key, value)` pairs in key order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        self.values
            .read()
            .iter()
            .map(|(key, value)| (*key, value.clone()))
            .collect()
    }
}

impl ConfigStore for MemoryConfig {
    fn get_boolean(&self, key: &str) -> bool {
        let values = self.values.read();
        let Some(value) = values.get(key) else {
            log::warn!("unknown config key `{key}`");
            return false;
        };
        parse_boolean(value).unwrap_or_else(|| {
            log::warn!("config `{key}` = `{value}` is not a boolean");
            false
        })
    }
}

/// Start-up parameters for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub name: &'static str,
    pub priority: u8,
    pub queue_capacity: usize,
    /// Delay spent in `Pausing` before the next scan.
    pub poll_interval: Duration,
    /// Bound on a single driver connect attempt.
    pub connect_timeout: Duration,
    pub tick_source: TickSource,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: "network manager",
            priority: 2,
            queue_capacity: active::DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            tick_source: TickSource::default(),
        }
    }
}

impl ManagerConfig {
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    pub fn machine_config(&self) -> MachineConfig {
        MachineConfig::builder()
            .name(self.name)
            .priority(self.priority)
            .queue_capacity(self.queue_capacity)
            .build()
    }

    /// Poll interval in timer ticks, never less than one.
    pub fn poll_ticks(&self) -> u64 {
        active::ticks_for(self.poll_interval, self.tick_source.period()).max(1)
    }
}

/// Builder for [`ManagerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ManagerConfigBuilder {
    config: ManagerConfig,
}

impl ManagerConfigBuilder {
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.config.priority = priority;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn tick_source(mut self, source: TickSource) -> Self {
        self.config.tick_source = source;
        self
    }

    pub fn build(self) -> ManagerConfig {
        self.config
    }
}
