//! `/fly` command grammar.
//!
//! Parsing is pure: it turns a raw line into a [`FlyCommand`] or a
//! user-facing [`ParseError`]. Execution lives in [`crate::app`].
//!
//! Only bare `/fly`, `/fly on` and `/fly off` ever change whether an entity
//! flies; every other subcommand is read-only or an admin action.

use thiserror::Error;

const HELP: &str = "/fly, /fly on, /fly off, /fly get time, /fly get item <seconds>, \
                    /fly time add <player> <seconds>, /fly time unlimited <player> <on|off>, /fly status";
const GET_USAGE: &str = "/fly get time or /fly get item <seconds>";
const ITEM_USAGE: &str = "/fly get item <seconds>";
const TIME_USAGE: &str = "/fly time add <player> <seconds> or /fly time unlimited <player> <on|off>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlyCommand {
    /// Bare `/fly`: start if inactive, stop otherwise.
    Toggle,
    On,
    Off,
    GetTime,
    GetItem { seconds: u64 },
    TimeAdd { player: String, seconds: u64 },
    TimeUnlimited { player: String, enabled: bool },
    Status,
}

impl FlyCommand {
    /// Commands reserved for the console (operators).
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            FlyCommand::TimeAdd { .. } | FlyCommand::TimeUnlimited { .. } | FlyCommand::Status
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("not a /fly command")]
    NotFly,

    #[error("Invalid number for seconds: '{0}'.")]
    InvalidSeconds(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown subcommand. Try: {}", HELP)]
    Unknown,
}

/// True if `line` starts with the `/fly` command word.
pub fn is_fly_command(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("/fly") || word.eq_ignore_ascii_case("fly"))
}

/// Parse one `/fly ...` line. Keywords are case-insensitive; player names
/// are kept as typed.
pub fn parse(line: &str) -> Result<FlyCommand, ParseError> {
    if !is_fly_command(line) {
        return Err(ParseError::NotFly);
    }
    let args: Vec<&str> = line.split_whitespace().skip(1).collect();
    let keyword = |i: usize| args.get(i).map(|s| s.to_ascii_lowercase());

    match keyword(0).as_deref() {
        None => Ok(FlyCommand::Toggle),
        Some("on") if args.len() == 1 => Ok(FlyCommand::On),
        Some("off") if args.len() == 1 => Ok(FlyCommand::Off),
        Some("status") if args.len() == 1 => Ok(FlyCommand::Status),
        Some("get") => match keyword(1).as_deref() {
            Some("time") if args.len() == 2 => Ok(FlyCommand::GetTime),
            Some("item") if args.len() == 3 => Ok(FlyCommand::GetItem {
                seconds: parse_seconds(args[2])?,
            }),
            Some("item") => Err(ParseError::Usage(ITEM_USAGE)),
            _ => Err(ParseError::Usage(GET_USAGE)),
        },
        Some("time") => match keyword(1).as_deref() {
            Some("add") if args.len() == 4 => Ok(FlyCommand::TimeAdd {
                player: args[2].to_string(),
                seconds: parse_seconds(args[3])?,
            }),
            Some("unlimited") if args.len() == 4 => Ok(FlyCommand::TimeUnlimited {
                player: args[2].to_string(),
                enabled: parse_switch(args[3]).ok_or(ParseError::Usage(TIME_USAGE))?,
            }),
            _ => Err(ParseError::Usage(TIME_USAGE)),
        },
        _ => Err(ParseError::Unknown),
    }
}

/// Seconds arguments must be positive integers.
fn parse_seconds(raw: &str) -> Result<u64, ParseError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ParseError::InvalidSeconds(raw.to_string())),
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}
