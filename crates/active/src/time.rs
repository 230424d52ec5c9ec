//! Time event services.
//!
//! A [`TimeEvent`] counts down in ticks and runs its action when it expires;
//! the action normally posts a message to a state machine. A [`TimerWheel`]
//! advances every registered event by one tick, and a [`Ticker`] thread calls
//! the wheel at a fixed period. Owners that want deterministic timing (tests)
//! skip the ticker and call [`TimerWheel::tick`] themselves.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::mailbox::Poster;

/// Default tick period for [`TickSource::Thread`].
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

/// Where timer ticks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    /// A dedicated thread ticks the wheel at the given period.
    Thread(Duration),
    /// The owner calls [`TimerWheel::tick`] explicitly.
    Manual,
}

impl Default for TickSource {
    fn default() -> Self {
        Self::Thread(DEFAULT_TICK_PERIOD)
    }
}

impl TickSource {
    /// Tick period used to convert durations into ticks.
    pub fn period(&self) -> Duration {
        match self {
            Self::Thread(period) => *period,
            Self::Manual => DEFAULT_TICK_PERIOD,
        }
    }
}

/// Number of ticks covering `duration`, rounded up so a timer never fires
/// early.
pub fn ticks_for(duration: Duration, period: Duration) -> u64 {
    let period = period.as_nanos().max(1);
    let ticks = duration.as_nanos().div_ceil(period);
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

type TimeAction = Box<dyn Fn() + Send + Sync>;

struct TimeEventInner {
    remaining: u64,
    interval: Option<u64>,
    armed: bool,
}

/// Software timer measured in ticks.
pub struct TimeEvent {
    name: &'static str,
    inner: Mutex<TimeEventInner>,
    action: TimeAction,
}

impl TimeEvent {
    pub fn new<F>(name: &'static str, action: F) -> Arc<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(Self {
            name,
            inner: Mutex::new(TimeEventInner {
                remaining: 0,
                interval: None,
                armed: false,
            }),
            action: Box::new(action),
        })
    }

    /// Time event that posts `make()` to `poster` on expiry. A full queue is
    /// logged and the expiry is lost.
    pub fn posting<M, F>(name: &'static str, poster: Poster<M>, make: F) -> Arc<Self>
    where
        M: Send + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        Self::new(name, move || {
            if let Err(err) = poster.post(make()) {
                log::warn!("time event `{name}` dropped: {err}");
            }
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arms the event to expire after `timeout_ticks`, then every
    /// `interval_ticks` if given. Re-arming restarts the countdown.
    pub fn arm(&self, timeout_ticks: u64, interval_ticks: Option<u64>) {
        let mut inner = self.inner.lock();
        inner.remaining = timeout_ticks;
        inner.interval = interval_ticks;
        inner.armed = true;
        drop(inner);
        log::trace!("time event `{}` armed for {timeout_ticks} ticks", self.name);
    }

    /// Disarms the event. Returns whether it was armed.
    pub fn disarm(&self) -> bool {
        let mut inner = self.inner.lock();
        let was_armed = inner.armed;
        inner.armed = false;
        inner.remaining = 0;
        drop(inner);
        if was_armed {
            log::trace!("time event `{}` disarmed", self.name);
        }
        was_armed
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// Ticks left before expiry, `None` while disarmed.
    pub fn remaining(&self) -> Option<u64> {
        let inner = self.inner.lock();
        inner.armed.then_some(inner.remaining)
    }

    /// Advances the countdown by one tick and runs the action on expiry.
    /// The action runs outside the lock. Returns whether the event fired.
    pub fn poll(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.armed {
            return false;
        }

        if inner.remaining > 0 {
            inner.remaining -= 1;
        }
        if inner.remaining > 0 {
            return false;
        }

        match inner.interval {
            Some(period) => inner.remaining = period,
            None => inner.armed = false,
        }
        drop(inner);

        log::trace!("time event `{}` fired", self.name);
        (self.action)();
        true
    }
}

/// Registry of time events advanced together.
#[derive(Default)]
pub struct TimerWheel {
    events: Mutex<Vec<Arc<TimeEvent>>>,
}

impl TimerWheel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, event: Arc<TimeEvent>) {
        self.events.lock().push(event);
    }

    /// Advances every registered event by one tick. Returns how many fired.
    pub fn tick(&self) -> usize {
        // Snapshot so actions may register further events.
        let events: Vec<Arc<TimeEvent>> = self.events.lock().clone();
        events.iter().filter(|event| event.poll()).count()
    }

    /// Number of registered events currently armed.
    pub fn armed_count(&self) -> usize {
        self.events.lock().iter().filter(|event| event.is_armed()).count()
    }

    /// Convenience for tests and simulations.
    pub fn advance(&self, ticks: u64) -> usize {
        (0..ticks).map(|_| self.tick()).sum()
    }
}

/// Thread ticking a [`TimerWheel`] at a fixed period.
///
/// Sleeps until absolute monotonic deadlines, so jitter in one tick does not
/// accumulate. Stopped on drop.
pub struct Ticker {
    period: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Starts the tick thread. A zero period is rejected with
    /// [`io::ErrorKind::InvalidInput`].
    pub fn spawn(name: &str, period: Duration, wheel: Arc<TimerWheel>) -> io::Result<Self> {
        if period.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tick period must be non-zero",
            ));
        }
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("{name} ticker"))
            .spawn(move || ticker_loop(period, &flag, &wheel))?;
        Ok(Self {
            period,
            running,
            handle: Some(handle),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ticker_loop(period: Duration, running: &AtomicBool, wheel: &TimerWheel) {
    let mut next_tick = Instant::now();
    while running.load(Ordering::Relaxed) {
        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        }
        wheel.tick();
    }
}
