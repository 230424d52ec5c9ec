//! Bounded FIFO message queue with a single blocking consumer.
//!
//! Producers never block: a full queue is reported immediately and the message
//! is handed back to the caller's drop. The executor thread is the only
//! consumer and sleeps on a condition variable while the queue is empty.
//!
//! When the executor stops, the queue is closed: queued messages are dropped,
//! which wakes any caller waiting on them, and later posts fail.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Error returned by [`Poster::post`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    #[error("message queue of `{machine}` is full")]
    QueueFull { machine: &'static str },
    #[error("`{machine}` has stopped")]
    Closed { machine: &'static str },
}

/// Why [`Mailbox::push`] refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejected {
    Full,
    Closed,
}

struct Queue<M> {
    items: VecDeque<M>,
    closed: bool,
}

pub(crate) struct Mailbox<M> {
    queue: Mutex<Queue<M>>,
    ready: Condvar,
    capacity: usize,
}

impl<M> Mailbox<M> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(Queue {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Appends to the back of the queue. A refused message is dropped.
    pub(crate) fn push(&self, message: M) -> Result<(), Rejected> {
        let mut queue = self.queue.lock();
        if queue.closed {
            return Err(Rejected::Closed);
        }
        if queue.items.len() >= self.capacity {
            return Err(Rejected::Full);
        }
        queue.items.push_back(message);
        drop(queue);
        self.ready.notify_one();
        Ok(())
    }

    /// Blocks indefinitely until a message is available.
    pub(crate) fn pop_blocking(&self) -> M {
        let mut queue = self.queue.lock();
        loop {
            if let Some(message) = queue.items.pop_front() {
                return message;
            }
            self.ready.wait(&mut queue);
        }
    }

    /// Refuses further posts and drops everything still queued.
    pub(crate) fn close(&self) {
        let mut queue = self.queue.lock();
        queue.closed = true;
        let stranded = std::mem::take(&mut queue.items);
        drop(queue);
        drop(stranded);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.lock().items.len()
    }
}

/// Cloneable producer handle for a state machine's queue.
///
/// Safe to use from any thread, including driver callbacks.
pub struct Poster<M> {
    machine: &'static str,
    mailbox: Arc<Mailbox<M>>,
}

impl<M> Poster<M> {
    pub(crate) fn new(machine: &'static str, mailbox: Arc<Mailbox<M>>) -> Self {
        Self { machine, mailbox }
    }

    /// Enqueues `message` without blocking.
    pub fn post(&self, message: M) -> Result<(), PostError> {
        self.mailbox.push(message).map_err(|rejected| match rejected {
            Rejected::Full => PostError::QueueFull {
                machine: self.machine,
            },
            Rejected::Closed => PostError::Closed {
                machine: self.machine,
            },
        })
    }
}

impl<M> Clone for Poster<M> {
    fn clone(&self) -> Self {
        Self {
            machine: self.machine,
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}
