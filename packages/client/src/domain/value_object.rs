//! Value objects for the chat domain.

use std::{fmt, str::FromStr};

use uuid::Uuid;
use yapper_shared::time::{rfc3339_to_timestamp, timestamp_to_rfc3339};

use super::error::ValidationError;

/// Opaque identifier of a user, as issued by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a chat room (one room per matched pair of users).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyRoomId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text of an outgoing message. Rejects blank input; the original text
/// (including surrounding whitespace) is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageText(String);

impl MessageText {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Unix timestamp in milliseconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rfc3339(value: &str) -> Result<Self, ValidationError> {
        rfc3339_to_timestamp(value)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp(value.to_string()))
    }

    pub fn to_rfc3339(&self) -> Result<String, ValidationError> {
        timestamp_to_rfc3339(self.0)
            .ok_or_else(|| ValidationError::InvalidTimestamp(self.0.to_string()))
    }
}

/// Tag attached to a locally originated message so its echo can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientTag(Uuid);

impl ClientTag {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| ValidationError::InvalidClientTag(value.to_string()))
    }
}

impl fmt::Display for ClientTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Mood a user picks before searching for a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
    Happy,
    Sad,
    Excited,
    Lazy,
    Thirsty,
    Angry,
    Nervous,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Excited,
        Mood::Lazy,
        Mood::Thirsty,
        Mood::Angry,
        Mood::Nervous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
            Mood::Excited => "Excited",
            Mood::Lazy => "Lazy",
            Mood::Thirsty => "Thirsty",
            Mood::Angry => "Angry",
            Mood::Nervous => "Nervous",
        }
    }
}

impl FromStr for Mood {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownMood(s.to_string()))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the match the user wants to be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleChoice {
    Rizzler,
    Shawty,
}

impl RoleChoice {
    /// Value sent on the wire as the search `type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleChoice::Rizzler => "Rizzler",
            RoleChoice::Shawty => "shawty",
        }
    }
}

impl FromStr for RoleChoice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rizzler" => Ok(RoleChoice::Rizzler),
            "shawty" => Ok(RoleChoice::Shawty),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for RoleChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
