//! Active-object state machines.
//!
//! Each machine owns a bounded queue and one executor thread. The executor
//! blocks on the queue and hands every message to the handler of the current
//! state, one at a time, so handlers never run concurrently for the same
//! machine and need no locking of their own.
//!
//! States form a closed enum. A [`Behavior`] dispatches on that enum with a
//! single `match`, which keeps the set of handlers checked for exhaustiveness.
//! Transitions run inline on the executor: `Exit` to the old state, swap,
//! `Entry` to the new one.

use core::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;
use thiserror::Error;

use crate::mailbox::{Mailbox, PostError, Poster};
use crate::message::{reply_channel, Event, ReplyTo};

/// Queue length used by the firmware this engine was built for.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Human-readable state names for introspection and logging.
pub trait StateName {
    fn name(&self) -> &'static str;
}

/// Callback invoked with `(from, to)` on every real transition.
pub type TransitionHook = Arc<dyn Fn(&'static str, &'static str) + Send + Sync>;

/// Application state machine driven by the engine.
pub trait Behavior: Send + Sized + 'static {
    type State: StateName + Copy + Eq + fmt::Debug + Send + 'static;
    type Message: Send + 'static;

    /// Routes `event` to the handler for `state`.
    fn dispatch(
        &mut self,
        state: Self::State,
        event: Event<Self::Message>,
        ctx: &mut Context<Self>,
    );

    /// Changes the current state. Re-entering the current state is a no-op.
    fn set_state(&mut self, ctx: &mut Context<Self>, target: Self::State) {
        let current = ctx.state();
        if current == target {
            return;
        }
        self.dispatch(current, Event::Exit, ctx);
        ctx.enter(target);
        self.dispatch(target, Event::Entry, ctx);
    }
}

struct Shared {
    state_name: RwLock<Option<&'static str>>,
    hook: Option<TransitionHook>,
}

/// Per-machine context handed to every handler invocation.
pub struct Context<B: Behavior> {
    name: &'static str,
    state: B::State,
    poster: Poster<B::Message>,
    shared: Arc<Shared>,
}

impl<B: Behavior> Context<B> {
    fn new(
        name: &'static str,
        initial: B::State,
        poster: Poster<B::Message>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            name,
            state: initial,
            poster,
            shared,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> B::State {
        self.state
    }

    /// Posts to the back of this machine's own queue.
    pub fn post_self(&self, message: B::Message) -> Result<(), PostError> {
        self.poster.post(message)
    }

    pub fn poster(&self) -> Poster<B::Message> {
        self.poster.clone()
    }

    fn publish_initial(&self) {
        *self.shared.state_name.write() = Some(self.state.name());
        log::debug!("{}: initial state {}", self.name, self.state.name());
    }

    fn enter(&mut self, target: B::State) {
        let from = self.state.name();
        let to = target.name();
        self.state = target;
        *self.shared.state_name.write() = Some(to);
        log::debug!("{}: {} -> {}", self.name, from, to);
        if let Some(hook) = &self.shared.hook {
            hook(from, to);
        }
    }
}

/// Errors raised while creating a machine. No machine exists afterwards.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("executor stopped before completing the initial entry")]
    StartAborted,
}

/// Sizing and naming for a state machine.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub name: &'static str,
    /// Scheduling priority of the executor. Recorded and logged; host
    /// threads run at the platform default.
    pub priority: u8,
    pub queue_capacity: usize,
    /// Executor stack size in bytes; `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: "active",
            priority: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stack_size: None,
        }
    }
}

impl MachineConfig {
    pub fn builder() -> MachineConfigBuilder {
        MachineConfigBuilder::default()
    }

    fn validate(&self) -> Result<(), MachineError> {
        if self.name.is_empty() {
            return Err(MachineError::InvalidConfig("name must not be empty"));
        }
        if self.queue_capacity == 0 {
            return Err(MachineError::InvalidConfig("queue capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Builder for [`MachineConfig`].
#[derive(Debug, Clone, Default)]
pub struct MachineConfigBuilder {
    config: MachineConfig,
}

impl MachineConfigBuilder {
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

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    pub fn build(self) -> MachineConfig {
        self.config
    }
}

/// Builder that spawns a [`StateMachine`].
pub struct StateMachineBuilder {
    config: MachineConfig,
    hook: Option<TransitionHook>,
}

impl StateMachineBuilder {
    pub fn new(config: MachineConfig) -> Self {
        Self { config, hook: None }
    }

    pub fn with_transition_hook(mut self, hook: TransitionHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Allocates the queue, starts the executor and runs the initial entry on
    /// it. Returns once that entry action has completed.
    pub fn spawn<B: Behavior>(
        self,
        initial: B::State,
        behavior: B,
    ) -> Result<StateMachine<B::Message>, MachineError> {
        self.spawn_with(initial, |_poster| behavior)
    }

    /// Like [`spawn`](Self::spawn), but builds the behavior from the
    /// machine's own poster, for behaviors that own timers or callbacks
    /// posting back to themselves.
    pub fn spawn_with<B, F>(
        self,
        initial: B::State,
        make: F,
    ) -> Result<StateMachine<B::Message>, MachineError>
    where
        B: Behavior,
        F: FnOnce(Poster<B::Message>) -> B,
    {
        let config = self.config;
        config.validate()?;

        let mailbox = Arc::new(Mailbox::new(config.queue_capacity));
        let poster = Poster::new(config.name, Arc::clone(&mailbox));
        let behavior = make(poster.clone());
        let shared = Arc::new(Shared {
            state_name: RwLock::new(None),
            hook: self.hook,
        });
        let ctx = Context::new(config.name, initial, poster.clone(), Arc::clone(&shared));

        let mut builder = thread::Builder::new().name(config.name.to_string());
        if let Some(bytes) = config.stack_size {
            builder = builder.stack_size(bytes);
        }

        let (started, waiter) = reply_channel::<()>();
        builder.spawn(move || run(behavior, ctx, mailbox, started))?;
        waiter.wait().map_err(|_| MachineError::StartAborted)?;

        log::info!(
            "{}: executor started (priority {}, queue {})",
            config.name,
            config.priority,
            config.queue_capacity
        );

        Ok(StateMachine {
            name: config.name,
            priority: config.priority,
            poster,
            shared,
        })
    }
}

/// Closes the mailbox when the executor leaves `run`, normally or by panic.
struct CloseOnExit<'a, M> {
    name: &'static str,
    mailbox: &'a Mailbox<M>,
}

impl<M> Drop for CloseOnExit<'_, M> {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("{}: executor panicked, closing its queue", self.name);
        }
        self.mailbox.close();
    }
}

fn run<B: Behavior>(
    mut behavior: B,
    mut ctx: Context<B>,
    mailbox: Arc<Mailbox<B::Message>>,
    started: ReplyTo<()>,
) {
    let _close = CloseOnExit {
        name: ctx.name(),
        mailbox: &mailbox,
    };

    let initial = ctx.state();
    ctx.publish_initial();
    behavior.dispatch(initial, Event::Entry, &mut ctx);
    started.send(());

    loop {
        let message = mailbox.pop_blocking();
        let state = ctx.state();
        behavior.dispatch(state, Event::Message(message), &mut ctx);
    }
}

/// Handle to a running state machine. The executor lives for the rest of the
/// process unless a handler panics, after which every post fails with
/// [`PostError::Closed`].
pub struct StateMachine<M> {
    name: &'static str,
    priority: u8,
    poster: Poster<M>,
    shared: Arc<Shared>,
}

impl<M: Send + 'static> StateMachine<M> {
    pub fn spawn<B: Behavior<Message = M>>(
        config: MachineConfig,
        initial: B::State,
        behavior: B,
    ) -> Result<Self, MachineError> {
        StateMachineBuilder::new(config).spawn(initial, behavior)
    }

    /// Non-blocking post; fails immediately when the queue is full or the
    /// executor has stopped.
    pub fn post(&self, message: M) -> Result<(), PostError> {
        self.poster.post(message)
    }

    pub fn poster(&self) -> Poster<M> {
        self.poster.clone()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the current state, `None` before the initial entry.
    pub fn state_name(&self) -> Option<&'static str> {
        *self.shared.state_name.read()
    }
}

impl<M> fmt::Debug for StateMachine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("state", &*self.shared.state_name.read())
            .finish()
    }
}
