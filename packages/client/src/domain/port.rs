//! Outbound port used by the domain state machines.
//!
//! The domain decides *what* to tell the server; the connection manager in the
//! infrastructure layer implements this trait and decides *how* (dependency
//! inversion).

use super::{event::OutboundEvent, value_object::UserId};

/// Sink for client → server events.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink {
    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Queue an event for the server.
    ///
    /// Returns `false` when the event was dropped because the connection is
    /// not established. Events are never buffered for later delivery.
    fn emit(&self, event: OutboundEvent) -> bool;
}

/// Lifecycle control over the link behind an [`EventSink`].
pub trait ConnectionPort: EventSink {
    /// Start connecting as `user_id`; idempotent while open.
    fn open(&mut self, user_id: &UserId);

    /// Stop the link and any retries.
    fn close(&mut self);
}
