//! Line protocol of the interactive console.
//!
//! ```text
//! join <name>            player connects
//! leave <name>           player disconnects
//! use <name>             player uses the first voucher they hold
//! inv <name>             list a player's inventory
//! as <name> /fly ...     run a /fly command as that player
//! /fly ...               run a /fly command as the console (admin)
//! quit                   shut down
//! ```

use thiserror::Error;

use crate::commands::{self, FlyCommand, ParseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Empty,
    Join(String),
    Leave(String),
    Use(String),
    Inventory(String),
    As { player: String, command: FlyCommand },
    Command(FlyCommand),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Command(#[from] ParseError),

    #[error("Unknown input '{0}'. Try: join <name>, leave <name>, use <name>, inv <name>, as <name> /fly ..., /fly ..., quit")]
    Unknown(String),
}

pub fn parse_line(line: &str) -> Result<ConsoleInput, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Empty);
    }
    if commands::is_fly_command(line) {
        return Ok(ConsoleInput::Command(commands::parse(line)?));
    }

    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(w, r)| (w, r.trim()))
        .unwrap_or((line, ""));

    match word.to_ascii_lowercase().as_str() {
        "quit" | "exit" | "stop" if rest.is_empty() => Ok(ConsoleInput::Quit),
        "join" => single_name(rest, "join <name>").map(ConsoleInput::Join),
        "leave" | "kick" => single_name(rest, "leave <name>").map(ConsoleInput::Leave),
        "use" => single_name(rest, "use <name>").map(ConsoleInput::Use),
        "inv" | "inventory" => single_name(rest, "inv <name>").map(ConsoleInput::Inventory),
        "as" => {
            let (player, command) = rest
                .split_once(char::is_whitespace)
                .ok_or(ConsoleError::Usage("as <name> /fly ..."))?;
            Ok(ConsoleInput::As {
                player: player.to_string(),
                command: commands::parse(command.trim())?,
            })
        }
        _ => Err(ConsoleError::Unknown(word.to_string())),
    }
}

fn single_name(rest: &str, usage: &'static str) -> Result<String, ConsoleError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(name), None) => Ok(name.to_string()),
        _ => Err(ConsoleError::Usage(usage)),
    }
}
