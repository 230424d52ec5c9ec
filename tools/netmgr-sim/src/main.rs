use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use active::TickSource;
use anyhow::{Context, Result};
use clap::Parser;
use netmgr::sim::{SimTelemetry, SimWifi};
use netmgr::{
    Collaborators, ConnectionManager, Credentials, KnownNetworks, ManagerConfig, MemoryConfig,
    MemoryKnownNetworks, ResultCode, NETWORK_AUTOCONNECT, TELEMETRY_ENABLE,
};

mod console;

use console::{ConsoleCommand, MENU};

/// `ssid:password[:rssi]`
#[derive(Debug, Clone)]
struct ApSpec {
    ssid: String,
    password: String,
    rssi: i8,
}

fn parse_ap(text: &str) -> Result<ApSpec, String> {
    let mut parts = text.splitn(3, ':');
    let ssid = parts.next().filter(|s| !s.is_empty()).ok_or("missing ssid")?;
    let password = parts.next().ok_or("missing password")?;
    let rssi = match parts.next() {
        Some(value) => value
            .parse::<i8>()
            .map_err(|_| format!("bad rssi `{value}`"))?,
        None => -50,
    };
    Ok(ApSpec {
        ssid: ssid.to_string(),
        password: password.to_string(),
        rssi,
    })
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Network manager console on a simulated radio")]
struct Opts {
    /// Timer tick period in milliseconds.
    #[arg(
        long = "tick-ms",
        default_value_t = 100,
        value_name = "MS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    tick_ms: u64,

    /// Delay between retries while pausing, in milliseconds.
    #[arg(long = "poll-ms", default_value_t = 5000, value_name = "MS")]
    poll_ms: u64,

    #[arg(long = "connect-timeout-ms", default_value_t = 10_000, value_name = "MS")]
    connect_timeout_ms: u64,

    /// Connect to known networks right after `init`.
    #[arg(long)]
    autoconnect: bool,

    /// Run the simulated telemetry client while connected.
    #[arg(long)]
    telemetry: bool,

    /// Visible access point, `ssid:password[:rssi]`. Repeatable.
    #[arg(long = "ap", value_name = "AP", value_parser = parse_ap)]
    access_points: Vec<ApSpec>,

    /// Remembered network, `ssid:password`. Repeatable; first is most recent.
    #[arg(long = "known", value_name = "NET", value_parser = parse_ap)]
    known: Vec<ApSpec>,

    /// Send `init` before reading commands.
    #[arg(long)]
    init: bool,
}

impl Opts {
    fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::builder()
            .poll_interval(Duration::from_millis(self.poll_ms))
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .tick_source(TickSource::Thread(Duration::from_millis(self.tick_ms)))
            .build()
    }
}

struct Sim {
    manager: ConnectionManager,
    wifi: SimWifi,
    networks: MemoryKnownNetworks,
    config: Arc<MemoryConfig>,
    telemetry: SimTelemetry,
}

impl Sim {
    fn start(opts: &Opts) -> Result<Self> {
        let wifi = SimWifi::new();
        for ap in &opts.access_points {
            wifi.add_access_point(&ap.ssid, &ap.password, ap.rssi);
        }
        let networks = MemoryKnownNetworks::with_entries(
            opts.known
                .iter()
                .map(|net| Credentials::new(&net.ssid, &net.password)),
        );
        let config = Arc::new(MemoryConfig::new());
        config.set_boolean(NETWORK_AUTOCONNECT, opts.autoconnect);
        config.set_boolean(TELEMETRY_ENABLE, opts.telemetry);
        let telemetry = SimTelemetry::new();

        let collaborators = Collaborators {
            wifi: Box::new(wifi.clone()),
            networks: Box::new(networks.clone()),
            config: config.clone(),
            telemetry: Box::new(telemetry.clone()),
        };
        let manager = ConnectionManager::start(collaborators, opts.manager_config())
            .context("failed to start network manager")?;

        Ok(Self {
            manager,
            wifi,
            networks,
            config,
            telemetry,
        })
    }

    fn report(&self, what: &str, code: ResultCode) {
        println!("{what}: {}", ConnectionManager::error_string(code));
    }

    /// Runs one command. Returns `false` on `quit`.
    fn execute(&mut self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Help => {
                println!("--- Network Manager ---");
                for (cmd, desc) in MENU {
                    println!("{cmd:<20}: {desc}");
                }
            }
            ConsoleCommand::Init => {
                println!("initializing...");
                self.report("initialize", self.manager.initialize(true));
            }
            ConsoleCommand::Connect => {
                println!("starting scan for known networks...");
                self.report("connect", self.manager.connect(true));
            }
            ConsoleCommand::ConnectTo { ssid, password } => {
                println!("connecting to {ssid}...");
                self.report("connect_to", self.manager.connect_to(&ssid, &password, true));
            }
            ConsoleCommand::Disconnect => {
                println!("disconnecting...");
                self.report("disconnect", self.manager.disconnect(true));
            }
            ConsoleCommand::State => {
                println!("state: {}", self.manager.current_state_name());
                if let Some(ssid) = self.wifi.connected_ssid() {
                    println!("joined: {ssid}");
                }
                println!(
                    "telemetry: {}",
                    if self.telemetry.is_running() { "running" } else { "stopped" }
                );
            }
            ConsoleCommand::Known => {
                let entries = self.networks.snapshot();
                if entries.is_empty() {
                    println!("no known networks recorded");
                }
                for (index, entry) in entries.iter().enumerate() {
                    println!("{index:>2}: {}", entry.ssid());
                }
            }
            ConsoleCommand::AddKnown { ssid, password } => {
                match self.networks.add(&Credentials::new(&ssid, &password)) {
                    Ok(()) => println!("remembered {ssid}"),
                    Err(err) => println!("add: {err}"),
                }
            }
            ConsoleCommand::ShowKnown(index) => match self.networks.get(index) {
                Ok(entry) => println!("index {index}: {}", entry.ssid()),
                Err(err) => println!("show: {err}"),
            },
            ConsoleCommand::Forget { ssid } => match self.networks.remove(&ssid) {
                Ok(()) => println!("forgot {ssid}"),
                Err(err) => println!("forget: {err}"),
            },
            ConsoleCommand::ApAdd {
                ssid,
                password,
                rssi,
            } => self.wifi.add_access_point(&ssid, &password, rssi),
            ConsoleCommand::ApRemove { ssid } => {
                if !self.wifi.remove_access_point(&ssid) {
                    println!("no access point {ssid}");
                }
            }
            ConsoleCommand::ApList => {
                for ap in self.wifi.access_points() {
                    println!("{:<32} {:>4} dBm", ap.credentials.ssid(), ap.rssi);
                }
            }
            ConsoleCommand::DropLink => {
                if !self.wifi.drop_link() {
                    println!("not connected");
                }
            }
            ConsoleCommand::FailScan(fail) => self.wifi.set_fail_scan(fail),
            ConsoleCommand::FailConnect(fail) => self.wifi.set_fail_connect(fail),
            ConsoleCommand::ShowConfig => {
                for (key, value) in self.config.entries() {
                    println!("{key:<20} = {value}");
                }
            }
            ConsoleCommand::SetConfig { key, value } => {
                if !self.config.set(&key, &value) {
                    println!("config: cannot set {key}");
                }
            }
            ConsoleCommand::Quit => return false,
        }
        true
    }
}

fn main() -> Result<()> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    let opts = Opts::parse();
    let mut sim = Sim::start(&opts)?;
    log::info!(
        "{} ready, ticking every {:?}",
        sim.manager.name(),
        sim.manager.tick_period().unwrap_or_default()
    );

    if opts.init {
        sim.execute(ConsoleCommand::Init);
    }
    sim.execute(ConsoleCommand::Help);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match console::parse(&line) {
            Ok(Some(command)) => {
                if !sim.execute(command) {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => println!("{err:#}"),
        }
    }
    Ok(())
}
