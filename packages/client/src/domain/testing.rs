//! Test doubles shared by the domain and usecase tests.

use std::cell::{Cell, RefCell};

use super::{
    event::OutboundEvent,
    port::EventSink,
    value_object::{RoomId, Timestamp, UserId},
};

/// `EventSink` that records everything it accepts, in order.
pub struct RecordingSink {
    connected: Cell<bool>,
    events: RefCell<Vec<OutboundEvent>>,
}

impl RecordingSink {
    pub fn connected() -> Self {
        Self {
            connected: Cell::new(true),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        let sink = Self::connected();
        sink.set_connected(false);
        sink
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<OutboundEvent> {
        self.events.borrow_mut().drain(..).collect()
    }
}

impl EventSink for RecordingSink {
    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn emit(&self, event: OutboundEvent) -> bool {
        if !self.connected.get() {
            return false;
        }
        self.events.borrow_mut().push(event);
        true
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id.to_string()).unwrap()
}

pub fn room(id: &str) -> RoomId {
    RoomId::new(id.to_string()).unwrap()
}

pub fn ts(millis: i64) -> Timestamp {
    Timestamp::new(millis)
}
