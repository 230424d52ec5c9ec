//! Most-recently-used list of remembered networks.
//!
//! Index 0 is always the network added last. Adding a network that is
//! already present moves it to the front instead of duplicating it.

use std::sync::Arc;

use heapless::Vec;
use parking_lot::Mutex;
use thiserror::Error;

use crate::types::Credentials;

pub const MAX_KNOWN_NETWORKS: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KnownNetworksError {
    #[error("no known network at index {0}")]
    InvalidIndex(usize),
    #[error("network `{0}` is not known")]
    NotFound(String),
    #[error("could not save known networks: {0}")]
    SaveFailed(String),
}

/// Store of remembered credentials, ordered by recency.
pub trait KnownNetworks: Send {
    /// Loads the stored list.
    fn init(&mut self) -> Result<(), KnownNetworksError>;

    /// Inserts or refreshes `credentials` at index 0.
    fn add(&mut self, credentials: &Credentials) -> Result<(), KnownNetworksError>;

    fn remove(&mut self, ssid: &str) -> Result<(), KnownNetworksError>;

    fn get(&self, index: usize) -> Result<Credentials, KnownNetworksError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Entries = Vec<Credentials, MAX_KNOWN_NETWORKS>;

/// In-memory list. Clones share the same entries, so a test or console can
/// keep a handle after the manager has taken ownership of another.
#[derive(Debug, Clone, Default)]
pub struct MemoryKnownNetworks {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryKnownNetworks {
    pub fn new() -> Self {
        Self::default()
    }

    /// List seeded with `networks`, most recent first. Entries beyond the
    /// capacity are dropped.
    pub fn with_entries<I>(networks: I) -> Self
    where
        I: IntoIterator<Item = Credentials>,
    {
        let mut entries = Entries::new();
        for credentials in networks {
            if entries.iter().any(|known| known.ssid() == credentials.ssid()) {
                continue;
            }
            if entries.push(credentials).is_err() {
                log::warn!("known networks list full, dropping remaining seed entries");
                break;
            }
        }
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    /// Copy of the current list, most recent first.
    pub fn snapshot(&self) -> std::vec::Vec<Credentials> {
        self.entries.lock().iter().cloned().collect()
    }
}

fn position(entries: &Entries, ssid: &str) -> Option<usize> {
    entries.iter().position(|known| known.matches_ssid(ssid))
}

impl KnownNetworks for MemoryKnownNetworks {
    fn init(&mut self) -> Result<(), KnownNetworksError> {
        log::debug!("{} known networks", self.entries.lock().len());
        Ok(())
    }

    fn add(&mut self, credentials: &Credentials) -> Result<(), KnownNetworksError> {
        let mut entries = self.entries.lock();
        if let Some(index) = position(&entries, credentials.ssid()) {
            entries.remove(index);
        }
        if entries.is_full() {
            if let Some(oldest) = entries.pop() {
                log::info!("forgetting least recently used network `{}`", oldest.ssid());
            }
        }
        entries
            .insert(0, credentials.clone())
            .map_err(|_| KnownNetworksError::SaveFailed("list full".into()))
    }

    fn remove(&mut self, ssid: &str) -> Result<(), KnownNetworksError> {
        let mut entries = self.entries.lock();
        let index =
            position(&entries, ssid).ok_or_else(|| KnownNetworksError::NotFound(ssid.into()))?;
        entries.remove(index);
        Ok(())
    }

    fn get(&self, index: usize) -> Result<Credentials, KnownNetworksError> {
        self.entries
            .lock()
            .get(index)
            .cloned()
            .ok_or(KnownNetworksError::InvalidIndex(index))
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
