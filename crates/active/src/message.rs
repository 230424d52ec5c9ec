//! Messages, engine events and the reply convention.
//!
//! A message couples an application signal with an optional handle to the
//! caller that is blocked waiting for the outcome. The signal type is an
//! application enum whose variants carry their payload by value, so a handler
//! never reinterprets raw bytes.
//!
//! The reply handle is the producer half of a one-shot channel. Replying
//! consumes it, which makes a second reply to the same message a no-op rather
//! than a second wake-up of the caller.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures::channel::oneshot;
use thiserror::Error;

/// Event delivered to a state handler.
///
/// `Entry` and `Exit` are synthesised by the engine while it performs a
/// transition; they can never be posted to a queue.
#[derive(Debug)]
pub enum Event<M> {
    Entry,
    Exit,
    Message(M),
}

impl<M> Event<M> {
    pub fn into_message(self) -> Option<M> {
        match self {
            Event::Message(message) => Some(message),
            Event::Entry | Event::Exit => None,
        }
    }
}

/// The waiting side vanished, or the reply handle was dropped unanswered.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply handle dropped without a reply")]
    Dropped,
}

/// Handle used by a state handler to resolve a caller's request.
pub struct ReplyTo<R> {
    tx: oneshot::Sender<R>,
}

impl<R> ReplyTo<R> {
    /// Wakes the waiting caller with `result`.
    pub fn send(self, result: R) {
        if self.tx.send(result).is_err() {
            log::debug!("reply dropped: caller stopped waiting");
        }
    }
}

impl<R> fmt::Debug for ReplyTo<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyTo")
            .field("canceled", &self.tx.is_canceled())
            .finish()
    }
}

/// Caller side of a request: resolves exactly once.
///
/// Blocking callers use [`ReplyWaiter::wait`]; async callers can `.await` the
/// waiter directly.
pub struct ReplyWaiter<R> {
    rx: oneshot::Receiver<R>,
}

impl<R> ReplyWaiter<R> {
    /// Blocks the current thread until the reply arrives. No timeout.
    pub fn wait(self) -> Result<R, ReplyError> {
        futures::executor::block_on(self.rx).map_err(|_| ReplyError::Dropped)
    }

    /// Non-blocking check used by tests and pollers.
    pub fn try_take(&mut self) -> Result<Option<R>, ReplyError> {
        self.rx.try_recv().map_err(|_| ReplyError::Dropped)
    }
}

impl<R> Future for ReplyWaiter<R> {
    type Output = Result<R, ReplyError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| ReplyError::Dropped))
    }
}

impl<R> fmt::Debug for ReplyWaiter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyWaiter")
    }
}

/// Creates a connected reply handle and waiter.
pub fn reply_channel<R>() -> (ReplyTo<R>, ReplyWaiter<R>) {
    let (tx, rx) = oneshot::channel();
    (ReplyTo { tx }, ReplyWaiter { rx })
}

/// Application message: a signal plus an optional waiting caller.
pub struct Message<S, R> {
    pub signal: S,
    reply_to: Option<ReplyTo<R>>,
}

impl<S, R> Message<S, R> {
    /// Fire-and-forget message; nobody waits for the outcome.
    pub fn new(signal: S) -> Self {
        Self {
            signal,
            reply_to: None,
        }
    }

    /// Message for a synchronous call. The returned waiter receives the reply.
    pub fn call(signal: S) -> (Self, ReplyWaiter<R>) {
        let (reply_to, waiter) = reply_channel();
        let message = Self {
            signal,
            reply_to: Some(reply_to),
        };
        (message, waiter)
    }

    /// Builds either a fire-and-forget message or a call, depending on `wait`.
    pub fn request(signal: S, wait: bool) -> (Self, Option<ReplyWaiter<R>>) {
        if wait {
            let (message, waiter) = Self::call(signal);
            (message, Some(waiter))
        } else {
            (Self::new(signal), None)
        }
    }

    /// True until the message has been replied to.
    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Resolves the waiting caller, if any. Returns `false` when there was
    /// nobody to notify, including when the message was already replied to.
    pub fn reply(&mut self, result: R) -> bool {
        match self.reply_to.take() {
            Some(reply_to) => {
                reply_to.send(result);
                true
            }
            None => false,
        }
    }
}

impl<S: fmt::Debug, R> fmt::Debug for Message<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("signal", &self.signal)
            .field("reply_to", &self.reply_to.is_some())
            .finish()
    }
}
