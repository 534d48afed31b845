//! Parsing of console input lines.

use crate::domain::{
    error::ValidationError,
    value_object::{Mood, RoleChoice},
};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: send to the active room.
    Say(String),
    /// Show the all-chats list and ask the server for a fresh one.
    Chats,
    /// Open a room by list position (1-based) or by room id.
    Open(String),
    Search {
        mood: Option<Mood>,
        role: Option<RoleChoice>,
    },
    Stop,
    Leave,
    Help,
    Quit,
    Unknown(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ValidationError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default().to_lowercase();
    let command = match name.as_str() {
        "chats" => Command::Chats,
        "open" => match words.next() {
            Some(target) => Command::Open(target.to_string()),
            None => Command::Unknown("/open needs a list number or room id".to_string()),
        },
        "search" => parse_search(words)?,
        "stop" => Command::Stop,
        "leave" => Command::Leave,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(format!("Unknown command '/{}'", name)),
    };
    Ok(Some(command))
}

/// Mood and role may be given in either order; missing ones stay unset.
fn parse_search<'a>(words: impl Iterator<Item = &'a str>) -> Result<Command, ValidationError> {
    let mut mood = None;
    let mut role = None;
    for word in words {
        if let Ok(parsed) = word.parse::<Mood>() {
            mood = Some(parsed);
        } else if let Ok(parsed) = word.parse::<RoleChoice>() {
            role = Some(parsed);
        } else {
            return Err(ValidationError::UnknownMood(word.to_string()));
        }
    }
    Ok(Command::Search { mood, role })
}
