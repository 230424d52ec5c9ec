//! Fixed-width network records.
//!
//! SSIDs hold at most 32 bytes and passphrases 63, the limits of the
//! 802.11 station configuration. Longer input is cut at the last character
//! that still fits rather than rejected.

use core::fmt;

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const SSID_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 63;

pub type Ssid = String<SSID_MAX_LEN>;
pub type Password = String<PASSWORD_MAX_LEN>;

/// Copies as many whole characters of `value` as fit in `N` bytes.
pub fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for ch in value.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// A remembered network: SSID plus passphrase.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    ssid: Ssid,
    password: Password,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: truncated(ssid),
            password: truncated(password),
        }
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Byte-exact, case-sensitive comparison after truncation to SSID width.
    pub fn matches_ssid(&self, ssid: &str) -> bool {
        self.ssid == truncated::<SSID_MAX_LEN>(ssid)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid.as_str())
            .field("password", &"***")
            .finish()
    }
}

/// One access point seen by the last scan.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub ssid: Ssid,
    pub rssi: i8,
}

impl ScanRecord {
    pub fn new(ssid: &str, rssi: i8) -> Self {
        Self {
            ssid: truncated(ssid),
            rssi,
        }
    }
}
