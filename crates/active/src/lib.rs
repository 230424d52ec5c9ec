//! # active
//!
//! Active-object state machines for small connected devices. Every machine
//! owns a bounded message queue and a dedicated executor thread; producers on
//! any thread post messages without blocking, and the executor hands them one
//! at a time to the handler of the current state.
//!
//! ## Module Overview
//! - [`message`] – Messages, engine events and the at-most-once reply handle.
//! - [`mailbox`] – Bounded FIFO queue and the cloneable [`Poster`].
//! - [`machine`] – [`Behavior`] trait, transition protocol and executor.
//! - [`time`]    – One-shot and periodic time events, timer wheel, ticker.

pub mod machine;
pub mod mailbox;
pub mod message;
pub mod time;

pub use machine::{
    Behavior, Context, MachineConfig, MachineConfigBuilder, MachineError, StateMachine,
    StateMachineBuilder, StateName, TransitionHook, DEFAULT_QUEUE_CAPACITY,
};
pub use mailbox::{PostError, Poster};
pub use message::{reply_channel, Event, Message, ReplyError, ReplyTo, ReplyWaiter};
pub use time::{ticks_for, TickSource, Ticker, TimeEvent, TimerWheel, DEFAULT_TICK_PERIOD};

#[cfg(test)]
mod tests;
