//! Room membership bookkeeping.
//!
//! Membership is an optimistic local cache of "have I told the server I'm in
//! this room". Its purpose is de-duplicating outbound join requests, so a room
//! counts as joined as soon as the join has been emitted.

use std::collections::BTreeSet;

use super::{
    error::SessionError,
    event::OutboundEvent,
    port::EventSink,
    value_object::{RoomId, UserId},
};

#[derive(Debug, Default)]
pub struct RoomRegistry {
    joined: BTreeSet<RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room: announce it, request its history and record membership.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - join and history request were emitted
    /// * `Ok(false)` - already a member, nothing emitted
    /// * `Err(SessionError::NotConnected)` - rejected locally, membership unchanged
    pub fn join(
        &mut self,
        room_id: &RoomId,
        user_id: &UserId,
        sink: &dyn EventSink,
    ) -> Result<bool, SessionError> {
        if self.joined.contains(room_id) {
            tracing::debug!("Room '{}' already joined, skipping join", room_id);
            return Ok(false);
        }
        if !sink.is_connected() {
            tracing::warn!("Cannot join room '{}' while disconnected", room_id);
            return Err(SessionError::NotConnected);
        }

        sink.emit(OutboundEvent::JoinRoom {
            room_id: room_id.clone(),
            user_id: user_id.clone(),
        });
        sink.emit(OutboundEvent::RequestHistory {
            room_id: room_id.clone(),
        });
        self.joined.insert(room_id.clone());
        tracing::info!("Joined room '{}'", room_id);

        Ok(true)
    }

    /// Leave a room. Membership is released even when the announcement
    /// cannot be delivered.
    ///
    /// Returns `true` if the room was a member.
    pub fn leave(&mut self, room_id: &RoomId, user_id: &UserId, sink: &dyn EventSink) -> bool {
        if !self.joined.remove(room_id) {
            return false;
        }

        let delivered = sink.emit(OutboundEvent::LeaveRoom {
            room_id: room_id.clone(),
            user_id: user_id.clone(),
        });
        if delivered {
            tracing::info!("Left room '{}'", room_id);
        } else {
            tracing::debug!("Left room '{}' locally (connection down)", room_id);
        }

        true
    }

    /// Re-announce every member room, e.g. after the link was re-established.
    /// History is requested again so the server-authoritative copy replaces
    /// whatever was missed.
    ///
    /// Returns the number of rooms re-announced.
    pub fn rejoin_all(&self, user_id: &UserId, sink: &dyn EventSink) -> usize {
        let mut count = 0;
        for room_id in &self.joined {
            let joined = sink.emit(OutboundEvent::JoinRoom {
                room_id: room_id.clone(),
                user_id: user_id.clone(),
            });
            if joined {
                sink.emit(OutboundEvent::RequestHistory {
                    room_id: room_id.clone(),
                });
                count += 1;
            }
        }
        count
    }

    pub fn is_member(&self, room_id: &RoomId) -> bool {
        self.joined.contains(room_id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &RoomId> {
        self.joined.iter()
    }

    pub fn len(&self) -> usize {
        self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }

    /// Forget every membership without notifying the server (used on disconnect).
    pub fn clear(&mut self) {
        self.joined.clear();
    }
}
