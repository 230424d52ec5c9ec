//! Line-oriented command parser for the simulator console.

use anyhow::{anyhow, bail, Context, Result};

/// Commands understood by the console, with their help text.
pub const MENU: &[(&str, &str)] = &[
    ("help", "show this menu"),
    ("init", "initialize network manager"),
    ("connect", "connect to known networks"),
    ("connect_to", "connect to network <ssid> <pwd>"),
    ("disconnect", "disconnect from network"),
    ("state", "show current state"),
    ("known", "known networks: known | known add <ssid> <pwd> | known show <index>"),
    ("forget", "forget known network <ssid>"),
    ("ap", "simulated access points: ap add <ssid> <pwd> [rssi] | ap rm <ssid> | ap ls"),
    ("drop", "drop the simulated link"),
    ("fail", "inject failures: fail scan|connect on|off"),
    ("config", "show config, or set one: config <key> <value>"),
    ("quit", "leave the simulator"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Init,
    Connect,
    ConnectTo { ssid: String, password: String },
    Disconnect,
    State,
    Known,
    AddKnown { ssid: String, password: String },
    ShowKnown(usize),
    Forget { ssid: String },
    ApAdd { ssid: String, password: String, rssi: i8 },
    ApRemove { ssid: String },
    ApList,
    DropLink,
    FailScan(bool),
    FailConnect(bool),
    ShowConfig,
    SetConfig { key: String, value: String },
    Quit,
}

fn switch(word: Option<&str>) -> Result<bool> {
    match word {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => bail!("expected on|off"),
    }
}

fn required<'a>(word: Option<&'a str>, what: &str) -> Result<&'a str> {
    word.ok_or_else(|| anyhow!("missing {what}"))
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let parsed = match command {
        "help" | "?" => ConsoleCommand::Help,
        "init" => ConsoleCommand::Init,
        "connect" => ConsoleCommand::Connect,
        "connect_to" => ConsoleCommand::ConnectTo {
            ssid: required(words.next(), "ssid")?.to_string(),
            password: required(words.next(), "password")?.to_string(),
        },
        "disconnect" => ConsoleCommand::Disconnect,
        "state" => ConsoleCommand::State,
        "known" => match words.next() {
            None => ConsoleCommand::Known,
            Some("add") => ConsoleCommand::AddKnown {
                ssid: required(words.next(), "ssid")?.to_string(),
                password: required(words.next(), "password")?.to_string(),
            },
            Some("show") => {
                let index = required(words.next(), "index")?;
                ConsoleCommand::ShowKnown(
                    index
                        .parse::<usize>()
                        .with_context(|| format!("bad index [{index}]"))?,
                )
            }
            Some(other) => bail!("unknown known command [{other}]"),
        },
        "forget" => ConsoleCommand::Forget {
            ssid: required(words.next(), "ssid")?.to_string(),
        },
        "ap" => match words.next() {
            Some("add") => {
                let ssid = required(words.next(), "ssid")?.to_string();
                let password = required(words.next(), "password")?.to_string();
                let rssi = match words.next() {
                    Some(value) => value.parse::<i8>().context("rssi must be -128..127")?,
                    None => -50,
                };
                ConsoleCommand::ApAdd {
                    ssid,
                    password,
                    rssi,
                }
            }
            Some("rm") => ConsoleCommand::ApRemove {
                ssid: required(words.next(), "ssid")?.to_string(),
            },
            Some("ls") | None => ConsoleCommand::ApList,
            Some(other) => bail!("unknown ap command [{other}]"),
        },
        "drop" => ConsoleCommand::DropLink,
        "fail" => match words.next() {
            Some("scan") => ConsoleCommand::FailScan(switch(words.next())?),
            Some("connect") => ConsoleCommand::FailConnect(switch(words.next())?),
            _ => bail!("expected fail scan|connect on|off"),
        },
        "config" => match words.next() {
            None => ConsoleCommand::ShowConfig,
            Some(key) => ConsoleCommand::SetConfig {
                key: key.to_string(),
                value: required(words.next(), "value")?.to_string(),
            },
        },
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command [{other}]"),
    };
    Ok(Some(parsed))
}
