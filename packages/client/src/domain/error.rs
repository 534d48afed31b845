//! Domain error types.

use thiserror::Error;

/// Validation errors raised when constructing value objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("Type a message first.")]
    EmptyMessage,

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid client tag '{0}'")]
    InvalidClientTag(String),

    #[error("Unknown mood '{0}'.")]
    UnknownMood(String),

    #[error("Unknown role '{0}'. Choose Rizzler/Shawty.")]
    UnknownRole(String),
}

/// Precondition violations rejected locally, before anything reaches the peer.
///
/// The `Display` text doubles as the inline prompt shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Not connected to the chat server.")]
    NotConnected,

    #[error("Open a chat first.")]
    NoActiveRoom,

    #[error("This chat has no partner to send to.")]
    NoCounterpart,

    #[error("Select a mood first.")]
    MoodNotSelected,

    #[error("Choose Rizzler/Shawty.")]
    RoleNotSelected,

    #[error("Already searching for a partner.")]
    AlreadySearching,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
