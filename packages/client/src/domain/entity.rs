//! Domain entities.

use super::value_object::{ClientTag, Mood, RoleChoice, RoomId, Timestamp, UserId};

/// Where a message in the local view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Appended optimistically by this client before server confirmation.
    Local(ClientTag),
    /// Delivered by the server (history or live broadcast).
    Remote,
}

/// A message shown in a room view. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub text: String,
    pub timestamp: Timestamp,
    pub origin: MessageOrigin,
}

impl ChatMessage {
    pub fn is_local(&self) -> bool {
        matches!(self.origin, MessageOrigin::Local(_))
    }
}

/// Live message pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub text: String,
    pub timestamp: Timestamp,
    pub sender_nickname: Option<String>,
    pub receiver_nickname: Option<String>,
    /// Echo of the tag this client attached when sending, if the server relays it.
    pub client_tag: Option<ClientTag>,
}

impl IncomingMessage {
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            room_id: self.room_id.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            text: self.text.clone(),
            timestamp: self.timestamp,
            origin: MessageOrigin::Remote,
        }
    }
}

/// One message of a room's server-side history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub text: String,
    pub timestamp: Timestamp,
}

impl HistoryEntry {
    pub fn into_chat_message(self, room_id: RoomId) -> ChatMessage {
        ChatMessage {
            room_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            text: self.text,
            timestamp: self.timestamp,
            origin: MessageOrigin::Remote,
        }
    }
}

/// One row of the "all chats" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummaryEntry {
    pub room_id: RoomId,
    pub counterpart_id: UserId,
    pub counterpart_nickname: String,
    pub last_message: String,
    pub last_message_time: Timestamp,
}

/// Result of a successful matchmaking search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFound {
    pub room_id: RoomId,
    pub counterpart_id: UserId,
    pub counterpart_nickname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Idle,
    Searching,
    Matched,
    TimedOut,
}

/// An outstanding partner search. Exists only while searching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub user_id: UserId,
    pub role: RoleChoice,
    pub mood: Mood,
    pub status: SearchStatus,
    pub started_at: Timestamp,
}
