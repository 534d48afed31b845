//! Events crossing the connection boundary, in domain terms.
//!
//! The wire representation lives in `infrastructure::dto::websocket`.

use super::{
    entity::{ChatSummaryEntry, HistoryEntry, IncomingMessage, MatchFound},
    value_object::{ClientTag, MessageText, Mood, RoleChoice, RoomId, Timestamp, UserId},
};

/// Client → server actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    AnnouncePresence {
        user_id: UserId,
    },
    JoinRoom {
        room_id: RoomId,
        user_id: UserId,
    },
    LeaveRoom {
        room_id: RoomId,
        user_id: UserId,
    },
    RequestHistory {
        room_id: RoomId,
    },
    RequestAllSummaries {
        user_id: UserId,
    },
    SendMessage {
        room_id: RoomId,
        sender_id: UserId,
        receiver_id: UserId,
        text: MessageText,
        timestamp: Timestamp,
        client_tag: ClientTag,
    },
    StartSearch {
        user_id: UserId,
        role: RoleChoice,
        mood: Mood,
    },
    StopSearch {
        user_id: UserId,
    },
}

impl OutboundEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::AnnouncePresence { .. } => "announce_presence",
            OutboundEvent::JoinRoom { .. } => "join_room",
            OutboundEvent::LeaveRoom { .. } => "leave_room",
            OutboundEvent::RequestHistory { .. } => "request_history",
            OutboundEvent::RequestAllSummaries { .. } => "request_all_summaries",
            OutboundEvent::SendMessage { .. } => "send_message",
            OutboundEvent::StartSearch { .. } => "start_search",
            OutboundEvent::StopSearch { .. } => "stop_search",
        }
    }
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Past messages of a room, oldest first. `room_id` is `None` when the
    /// server sends a bare list; it then applies to the active room.
    HistoryLoaded {
        room_id: Option<RoomId>,
        messages: Vec<HistoryEntry>,
    },
    AllSummariesLoaded(Vec<ChatSummaryEntry>),
    MessageReceived(IncomingMessage),
    Matched(MatchFound),
    SearchTimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The single multiplexed stream produced by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The link is up and presence has been announced.
    Established { reconnected: bool },
    /// The link dropped unexpectedly; reconnection follows.
    Lost { reason: String },
    /// A connection attempt failed.
    Error { detail: String },
    /// Reconnection attempts are exhausted; the connection stays down.
    Failed { attempts: u32 },
    /// The server rejected the identity; not retried.
    Unauthorized,
    /// The connection was closed on request.
    Closed,
    Inbound(InboundEvent),
}
