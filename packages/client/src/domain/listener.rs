//! Inbound event listeners and the notices they produce.

use super::{
    entity::{ChatMessage, MatchFound, SearchRequest},
    event::InboundEvent,
    value_object::RoomId,
};

/// Something the user-facing surface should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// A remote message was added to the active room view.
    MessageAppended(ChatMessage),
    /// The active room view was replaced by server history.
    HistoryReplaced { room_id: RoomId, count: usize },
    /// The "all chats" list changed.
    SummariesChanged,
    /// A partner was found; the consumer should enter the room.
    MatchFound(MatchFound),
    /// The search ended without a match and the controller is idle again.
    SearchTimedOut(SearchRequest),
    Connected { reconnected: bool },
    ConnectionLost { reason: String },
    ConnectionFailed { attempts: u32 },
    Unauthenticated,
    Disconnected,
}

/// A component interested in server-pushed events.
///
/// Every listener sees the same inbound stream; each decides for itself what
/// to do with an event, so no listener branches on another's state.
pub trait InboundListener {
    /// Whether the listener currently wants events.
    fn is_subscribed(&self) -> bool {
        true
    }

    fn on_inbound(&mut self, event: &InboundEvent) -> Option<SessionNotice>;
}
