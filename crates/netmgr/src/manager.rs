//! The connection manager state machine.
//!
//! ```text
//!  UNINITIALIZED --Initialize--> NOT_CONNECTED --Connect--> SCANNING
//!                                      |                    |     ^
//!                                  ConnectTo          match |     | poll timer
//!                                      v                    v     |
//!                 CONNECTED <--ok-- CONNECTING --fail--> PAUSING -+
//!                     |                                     ^
//!                     +------------ConnectionLost-----------+
//! ```
//!
//! `Disconnect` from any initialised state returns to `NOT_CONNECTED`.
//! Scanning and connecting are slow, so their entry actions only post a
//! `Continue` to the back of the queue and the work happens as an ordinary
//! message. Every failure path ends in `PAUSING`, whose one-shot retry
//! timer leads back to `SCANNING`.

use std::sync::Arc;
use std::time::Duration;

use active::{
    Behavior, Context, Event, MachineError, Message, PostError, Poster, ReplyWaiter,
    StateMachine, StateMachineBuilder, StateName, TickSource, Ticker, TimeEvent, TimerWheel,
    TransitionHook,
};
use thiserror::Error;

use crate::bridge::EventBridge;
use crate::config::{ConfigStore, ManagerConfig, NETWORK_AUTOCONNECT, TELEMETRY_ENABLE};
use crate::known_networks::{KnownNetworks, KnownNetworksError};
use crate::result::ResultCode;
use crate::telemetry::{TelemetryClient, TelemetryError};
use crate::types::Credentials;
use crate::wifi::{DisconnectCallback, WifiDriver, WifiError};

/// Everything the manager posts to itself or accepts from callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Initialize,
    ConnectTo(Credentials),
    Connect,
    Disconnect,
    /// Runs the slow half of `Scanning` or `Connecting`.
    Continue,
    PollTimerFired,
    ConnectionLost,
}

/// Commands available to outside callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize,
    Connect,
    ConnectTo(Credentials),
    Disconnect,
}

impl From<Command> for Signal {
    fn from(command: Command) -> Self {
        match command {
            Command::Initialize => Signal::Initialize,
            Command::Connect => Signal::Connect,
            Command::ConnectTo(credentials) => Signal::ConnectTo(credentials),
            Command::Disconnect => Signal::Disconnect,
        }
    }
}

pub(crate) type Request = Message<Signal, ResultCode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    NotConnected,
    Scanning,
    Pausing,
    Connecting,
    Connected,
}

impl StateName for State {
    fn name(&self) -> &'static str {
        match self {
            State::Uninitialized => "UNINITIALIZED",
            State::NotConnected => "NOT_CONNECTED",
            State::Scanning => "SCANNING",
            State::Pausing => "PAUSING",
            State::Connecting => "CONNECTING",
            State::Connected => "CONNECTED",
        }
    }
}

/// Collaborators handed to the manager at start-up.
pub struct Collaborators {
    pub wifi: Box<dyn WifiDriver>,
    pub networks: Box<dyn KnownNetworks>,
    pub config: Arc<dyn ConfigStore>,
    pub telemetry: Box<dyn TelemetryClient>,
}

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Wifi(#[from] WifiError),
    #[error(transparent)]
    KnownNetworks(#[from] KnownNetworksError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

struct NetworkManager {
    wifi: Box<dyn WifiDriver>,
    networks: Box<dyn KnownNetworks>,
    config: Arc<dyn ConfigStore>,
    telemetry: Box<dyn TelemetryClient>,
    /// Caller waiting on the current connect attempt, if any.
    pending: Option<Request>,
    /// Network the next `CONNECTING` attempt joins, copied out of the known
    /// list when chosen.
    target: Option<Credentials>,
    retry_timer: Arc<TimeEvent>,
    poll_ticks: u64,
    connect_timeout: Duration,
    telemetry_running: bool,
}

type Ctx = Context<NetworkManager>;

fn ignore(state: State, request: &mut Request) {
    log::debug!("{} ignores {:?}", state.name(), request.signal);
    request.reply(ResultCode::CommandIgnored);
}

impl NetworkManager {
    fn new(collaborators: Collaborators, retry_timer: Arc<TimeEvent>, config: &ManagerConfig) -> Self {
        Self {
            wifi: collaborators.wifi,
            networks: collaborators.networks,
            config: collaborators.config,
            telemetry: collaborators.telemetry,
            pending: None,
            target: None,
            retry_timer,
            poll_ticks: config.poll_ticks(),
            connect_timeout: config.connect_timeout,
            telemetry_running: false,
        }
    }

    /// Self-posts `Continue`. A full queue would strand the machine, so
    /// fall back to the retry path instead.
    fn post_continue(&mut self, ctx: &mut Ctx) {
        if let Err(err) = ctx.post_self(Request::new(Signal::Continue)) {
            log::warn!("{}: {err}, retrying later", ctx.state().name());
            self.set_state(ctx, State::Pausing);
        }
    }

    fn resolve_pending(&mut self, code: ResultCode) {
        if let Some(mut pending) = self.pending.take() {
            pending.reply(code);
        }
    }

    fn bring_up(&mut self, ctx: &Ctx) -> Result<(), InitError> {
        self.wifi.init()?;
        self.networks.init()?;
        let bridge = EventBridge::new(ctx.poster());
        self.wifi.on_disconnect(bridge.into_callback())?;
        if self.config.get_boolean(TELEMETRY_ENABLE) {
            self.telemetry.init()?;
        }
        Ok(())
    }

    /// Known network to join, chosen by scan order: the first scanned access
    /// point with any known match wins.
    fn find_known_network(&mut self) -> Option<Credentials> {
        if let Err(err) = self.wifi.scan() {
            log::warn!("{err}");
            return None;
        }
        let found = self.wifi.scan_count();
        if found == 0 {
            log::debug!("scan found no access points");
            return None;
        }
        let known = self.networks.len();
        if known == 0 {
            log::debug!("no known networks recorded");
            return None;
        }

        for ap in 0..found {
            let record = match self.wifi.scan_record(ap) {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("{err}");
                    continue;
                }
            };
            for index in 0..known {
                match self.networks.get(index) {
                    Ok(entry) if entry.matches_ssid(&record.ssid) => {
                        log::info!("found known network `{}` ({} dBm)", entry.ssid(), record.rssi);
                        return Some(entry);
                    }
                    Ok(_) => {}
                    Err(err) => log::warn!("{err}"),
                }
            }
        }
        log::debug!("none of {found} access points is known");
        None
    }

    fn join_target(&mut self) -> Result<Credentials, ResultCode> {
        let credentials = self.target.take().ok_or_else(|| {
            log::warn!("no network selected to join");
            ResultCode::ConnectFailed
        })?;
        log::info!("connecting to `{}`", credentials.ssid());
        self.wifi
            .connect(&credentials, self.connect_timeout)
            .map_err(|err| {
                log::warn!("{err}");
                ResultCode::ConnectFailed
            })?;
        Ok(credentials)
    }

    fn uninitialized(&mut self, event: Event<Request>, ctx: &mut Ctx) {
        let Some(mut request) = event.into_message() else {
            return;
        };
        match request.signal {
            Signal::Initialize => {
                if let Err(err) = self.bring_up(ctx) {
                    log::error!("initialization failed: {err}");
                    request.reply(ResultCode::InitializationFailed);
                    return;
                }
                self.set_state(ctx, State::NotConnected);
                request.reply(ResultCode::Ok);

                if self.config.get_boolean(NETWORK_AUTOCONNECT) {
                    log::info!("auto-connect enabled");
                    if let Err(err) = ctx.post_self(Request::new(Signal::Connect)) {
                        log::warn!("auto-connect skipped: {err}");
                    }
                }
            }
            _ => {
                request.reply(ResultCode::NotInitialized);
            }
        }
    }

    fn not_connected(&mut self, event: Event<Request>, ctx: &mut Ctx) {
        let Some(mut request) = event.into_message() else {
            return;
        };
        match &request.signal {
            Signal::Connect => {
                request.reply(ResultCode::Ok);
                self.set_state(ctx, State::Scanning);
            }
            Signal::ConnectTo(credentials) => {
                if let Err(err) = self.networks.add(credentials) {
                    log::warn!("{err}");
                }
                self.target = Some(credentials.clone());
                self.pending = Some(request);
                self.set_state(ctx, State::Connecting);
            }
            Signal::Disconnect => {
                request.reply(ResultCode::Ok);
            }
            _ => ignore(State::NotConnected, &mut request),
        }
    }

    fn scanning(&mut self, event: Event<Request>, ctx: &mut Ctx) {
        let mut request = match event {
            Event::Entry => return self.post_continue(ctx),
            Event::Exit => return,
            Event::Message(request) => request,
        };
        match request.signal {
            Signal::Continue => match self.find_known_network() {
                Some(credentials) => {
                    self.target = Some(credentials);
                    self.pending = None;
                    self.set_state(ctx, State::Connecting);
                }
                None => self.set_state(ctx, State::Pausing),
            },
            Signal::Disconnect => {
                self.set_state(ctx, State::NotConnected);
                request.reply(ResultCode::Ok);
            }
            _ => ignore(State::Scanning, &mut request),
        }
    }

    fn pausing(&mut self, event: Event<Request>, ctx: &mut Ctx) {
        let mut request = match event {
            Event::Entry => {
                self.retry_timer.arm(self.poll_ticks, None);
                return;
            }
            Event::Exit => {
                self.retry_timer.disarm();
                return;
            }
            Event::Message(request) => request,
        };
        match request.signal {
            Signal::PollTimerFired => self.set_state(ctx, State::Scanning),
            Signal::Disconnect => {
                self.set_state(ctx, State::NotConnected);
                request.reply(ResultCode::Ok);
            }
            _ => ignore(State::Pausing, &mut request),
        }
    }

    fn connecting(&mut self, event: Event<Request>, ctx: &mut Ctx) {
        let mut request = match event {
            Event::Entry => return self.post_continue(ctx),
            Event::Exit => {
                // A Disconnect that overtook Continue leaves the caller waiting.
                self.resolve_pending(ResultCode::ConnectFailed);
                self.target = None;
                return;
            }
            Event::Message(request) => request,
        };
        match request.signal {
            Signal::Continue => {
                // Taken first so the exit action leaves it alone; the caller
                // is answered once the new state is in place.
                let mut pending = self.pending.take();
                let code = match self.join_target() {
                    Ok(credentials) => {
                        log::info!("connected to `{}`", credentials.ssid());
                        self.set_state(ctx, State::Connected);
                        ResultCode::Ok
                    }
                    Err(code) => {
                        self.set_state(ctx, State::Pausing);
                        code
                    }
                };
                if let Some(pending) = pending.as_mut() {
                    pending.reply(code);
                }
            }
            Signal::Disconnect => {
                self.wifi.disconnect();
                self.set_state(ctx, State::NotConnected);
                request.reply(ResultCode::Ok);
            }
            _ => ignore(State::Connecting, &mut request),
        }
    }

    fn connected(&mut self, event: Event<Request>, ctx: &mut Ctx) {
        let mut request = match event {
            Event::Entry => {
                if self.config.get_boolean(TELEMETRY_ENABLE) {
                    match self.telemetry.start() {
                        Ok(()) => self.telemetry_running = true,
                        Err(err) => log::warn!("{err}"),
                    }
                }
                return;
            }
            Event::Exit => {
                if self.telemetry_running {
                    self.telemetry.stop();
                    self.telemetry_running = false;
                }
                return;
            }
            Event::Message(request) => request,
        };
        match request.signal {
            Signal::Connect => {
                request.reply(ResultCode::Ok);
            }
            Signal::Disconnect => {
                self.wifi.disconnect();
                self.set_state(ctx, State::NotConnected);
                request.reply(ResultCode::Ok);
            }
            Signal::ConnectionLost => {
                log::warn!("connection lost");
                self.set_state(ctx, State::Pausing);
            }
            _ => ignore(State::Connected, &mut request),
        }
    }
}

impl Behavior for NetworkManager {
    type State = State;
    type Message = Request;

    fn dispatch(&mut self, state: State, event: Event<Request>, ctx: &mut Ctx) {
        match state {
            State::Uninitialized => self.uninitialized(event, ctx),
            State::NotConnected => self.not_connected(event, ctx),
            State::Scanning => self.scanning(event, ctx),
            State::Pausing => self.pausing(event, ctx),
            State::Connecting => self.connecting(event, ctx),
            State::Connected => self.connected(event, ctx),
        }
    }
}

/// Setup-time failures. No manager exists afterwards.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error("failed to start timer ticker: {0}")]
    Ticker(#[source] std::io::Error),
}

/// Handle to a running connection manager.
///
/// Dropping the handle stops the timer ticker; the executor thread keeps
/// running for the rest of the process.
pub struct ConnectionManager {
    machine: StateMachine<Request>,
    timers: Arc<TimerWheel>,
    ticker: Option<Ticker>,
}

impl ConnectionManager {
    pub fn start(collaborators: Collaborators, config: ManagerConfig) -> Result<Self, StartError> {
        Self::start_with_hook(collaborators, config, None)
    }

    /// Like [`start`](Self::start), calling `hook(from, to)` on every
    /// transition.
    pub fn start_with_hook(
        collaborators: Collaborators,
        config: ManagerConfig,
        hook: Option<TransitionHook>,
    ) -> Result<Self, StartError> {
        let timers = TimerWheel::new();
        let ticker = match config.tick_source {
            TickSource::Thread(period) => Some(
                Ticker::spawn(config.name, period, Arc::clone(&timers)).map_err(StartError::Ticker)?,
            ),
            TickSource::Manual => None,
        };

        let mut builder = StateMachineBuilder::new(config.machine_config());
        if let Some(hook) = hook {
            builder = builder.with_transition_hook(hook);
        }

        let machine = builder.spawn_with(State::Uninitialized, |poster: Poster<Request>| {
            let retry_timer =
                TimeEvent::posting("network poll", poster, || Request::new(Signal::PollTimerFired));
            timers.register(Arc::clone(&retry_timer));
            NetworkManager::new(collaborators, retry_timer, &config)
        })?;

        Ok(Self {
            machine,
            timers,
            ticker,
        })
    }

    /// Posts `command` and hands back the waiter without blocking. The
    /// waiter can be `.await`ed or waited on.
    pub fn submit(&self, command: Command) -> Result<ReplyWaiter<ResultCode>, PostError> {
        let (message, waiter) = Request::call(command.into());
        self.machine.post(message)?;
        Ok(waiter)
    }

    pub fn initialize(&self, wait: bool) -> ResultCode {
        self.request(Signal::Initialize, wait)
    }

    /// Starts automatic connection to the best known network. Always
    /// answered before any scan runs.
    pub fn connect(&self, wait: bool) -> ResultCode {
        self.request(Signal::Connect, wait)
    }

    /// Remembers the network and joins it. With `wait`, blocks until the
    /// attempt has succeeded or failed.
    pub fn connect_to(&self, ssid: &str, password: &str, wait: bool) -> ResultCode {
        self.request(Signal::ConnectTo(Credentials::new(ssid, password)), wait)
    }

    pub fn disconnect(&self, wait: bool) -> ResultCode {
        self.request(Signal::Disconnect, wait)
    }

    pub fn current_state_name(&self) -> &'static str {
        self.machine.state_name().unwrap_or("UNKNOWN")
    }

    pub fn error_string(code: ResultCode) -> &'static str {
        code.as_str()
    }

    /// Timer wheel driving the retry timer. Tick it by hand when started
    /// with [`TickSource::Manual`].
    pub fn timers(&self) -> &Arc<TimerWheel> {
        &self.timers
    }

    /// Callback that reports link loss to this manager, for drivers wired
    /// up outside `Initialize`.
    pub fn disconnect_callback(&self) -> DisconnectCallback {
        EventBridge::new(self.machine.poster()).into_callback()
    }

    pub fn name(&self) -> &'static str {
        self.machine.name()
    }

    pub fn tick_period(&self) -> Option<Duration> {
        self.ticker.as_ref().map(Ticker::period)
    }

    /// Posts an internal signal as if a timer or continuation had queued it.
    #[cfg(test)]
    pub(crate) fn post_signal(&self, signal: Signal) -> Result<(), PostError> {
        self.machine.post(Request::new(signal))
    }

    fn request(&self, signal: Signal, wait: bool) -> ResultCode {
        let (message, waiter) = Request::request(signal, wait);
        if let Err(err) = self.machine.post(message) {
            log::warn!("{err}");
            return ResultCode::PostFailed;
        }
        match waiter {
            None => ResultCode::Ok,
            Some(waiter) => waiter.wait().unwrap_or_else(|err| {
                log::error!("{}: {err}", self.machine.name());
                ResultCode::CommandIgnored
            }),
        }
    }
}
