//! Domain layer: value objects, entities and the client-side state machines.
//!
//! Nothing in here performs I/O. Outbound traffic goes through the
//! [`EventSink`] port, implemented by the infrastructure layer.

pub mod aggregator;
pub mod entity;
pub mod error;
pub mod event;
pub mod listener;
pub mod matchmaking;
pub mod port;
pub mod reconciler;
pub mod room_registry;
pub mod value_object;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::ChatSummaryAggregator;
pub use entity::{
    ChatMessage, ChatSummaryEntry, HistoryEntry, IncomingMessage, MatchFound, MessageOrigin,
    SearchRequest, SearchStatus,
};
pub use error::{SessionError, ValidationError};
pub use event::{ConnectionEvent, ConnectionState, InboundEvent, OutboundEvent};
pub use listener::{InboundListener, SessionNotice};
pub use matchmaking::MatchmakingController;
pub use port::{ConnectionPort, EventSink};
pub use reconciler::{ActiveRoom, EchoPolicy, IncomingOutcome, MessageReconciler, RoomViewState};
pub use room_registry::RoomRegistry;
pub use value_object::{ClientTag, MessageText, Mood, RoleChoice, RoomId, Timestamp, UserId};
