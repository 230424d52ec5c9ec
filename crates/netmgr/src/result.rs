//! Result codes returned by the connection manager entry points.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of a connection manager command.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    NotInitialized,
    CommandIgnored,
    InitializationFailed,
    ConnectFailed,
    PostFailed,
}

impl ResultCode {
    pub const ALL: [ResultCode; 6] = [
        ResultCode::Ok,
        ResultCode::NotInitialized,
        ResultCode::CommandIgnored,
        ResultCode::InitializationFailed,
        ResultCode::ConnectFailed,
        ResultCode::PostFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Ok => "no error",
            ResultCode::NotInitialized => "not initialized",
            ResultCode::CommandIgnored => "command ignored",
            ResultCode::InitializationFailed => "initialization failed",
            ResultCode::ConnectFailed => "connect failed",
            ResultCode::PostFailed => "could not post message",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable text for `code`.
pub fn error_string(code: ResultCode) -> &'static str {
    code.as_str()
}
