//! # netmgr
//!
//! Wi-Fi connection manager for small connected devices. The manager is an
//! active object: one executor thread owns the Wi-Fi driver and the known
//! networks list, and every command reaches it as a message. Callers choose
//! per command whether to fire and forget or to block until the outcome is
//! known.
//!
//! ## Module Overview
//! - [`manager`]        – The six-state connection manager and its handle.
//! - [`bridge`]         – Turns driver disconnect notifications into messages.
//! - [`result`]         – Result codes returned by every entry point.
//! - [`types`]          – Fixed-width credentials and scan records.
//! - [`wifi`]           – Wi-Fi driver interface.
//! - [`known_networks`] – Most-recently-used list of remembered networks.
//! - [`config`]         – Boolean feature flags and manager sizing.
//! - [`telemetry`]      – Telemetry client interface.
//! - [`sim`]            – Simulated driver and telemetry client for hosts.

pub mod bridge;
pub mod config;
pub mod known_networks;
pub mod manager;
pub mod result;
pub mod sim;
pub mod telemetry;
pub mod types;
pub mod wifi;

pub use bridge::EventBridge;
pub use config::{
    ConfigStore, ManagerConfig, ManagerConfigBuilder, MemoryConfig, NETWORK_AUTOCONNECT,
    TELEMETRY_ENABLE,
};
pub use known_networks::{KnownNetworks, KnownNetworksError, MemoryKnownNetworks, MAX_KNOWN_NETWORKS};
pub use manager::{Collaborators, Command, ConnectionManager, Signal, StartError, State};
pub use result::{error_string, ResultCode};
pub use telemetry::{TelemetryClient, TelemetryError};
pub use types::{Credentials, ScanRecord, PASSWORD_MAX_LEN, SSID_MAX_LEN};
pub use wifi::{DisconnectCallback, WifiDriver, WifiError};

#[cfg(test)]
mod tests;
