//! Driver notifications to manager messages.
//!
//! The Wi-Fi driver reports link loss on its own event thread. The bridge
//! turns each report into a `ConnectionLost` message on the manager's
//! queue using the non-blocking post, so it is safe to call from any
//! context.

use active::Poster;

use crate::manager::{Request, Signal};
use crate::wifi::DisconnectCallback;

/// Posts `ConnectionLost` to a connection manager.
#[derive(Clone)]
pub struct EventBridge {
    poster: Poster<Request>,
}

impl EventBridge {
    pub(crate) fn new(poster: Poster<Request>) -> Self {
        Self { poster }
    }

    /// Never blocks. A full queue drops the notification with a warning.
    pub fn notify_disconnected(&self) {
        if let Err(err) = self.poster.post(Request::new(Signal::ConnectionLost)) {
            log::warn!("link loss not delivered: {err}");
        }
    }

    pub fn into_callback(self) -> DisconnectCallback {
        Box::new(move || self.notify_disconnected())
    }
}
