//! The cross-room "all chats" list.
//!
//! One entry per room, kept sorted by last message time (newest first). The
//! list listens to every message event regardless of which room is displayed.

use super::{
    entity::{ChatSummaryEntry, IncomingMessage},
    error::SessionError,
    event::{InboundEvent, OutboundEvent},
    listener::{InboundListener, SessionNotice},
    port::EventSink,
    value_object::{RoomId, UserId},
};

pub struct ChatSummaryAggregator {
    local_user: UserId,
    entries: Vec<ChatSummaryEntry>,
    snapshot_requested: bool,
}

impl ChatSummaryAggregator {
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            entries: Vec::new(),
            snapshot_requested: false,
        }
    }

    /// Request the full list of prior chats from the server, once.
    ///
    /// Returns `Ok(false)` if the snapshot was already requested.
    pub fn load_all(&mut self, sink: &dyn EventSink) -> Result<bool, SessionError> {
        if self.snapshot_requested {
            return Ok(false);
        }
        if !sink.is_connected() {
            return Err(SessionError::NotConnected);
        }

        sink.emit(OutboundEvent::RequestAllSummaries {
            user_id: self.local_user.clone(),
        });
        self.snapshot_requested = true;

        Ok(true)
    }

    /// Request the snapshot again even if it was loaded before.
    pub fn refresh(&mut self, sink: &dyn EventSink) -> Result<bool, SessionError> {
        self.snapshot_requested = false;
        self.load_all(sink)
    }

    /// Replace the whole list with a server snapshot.
    pub fn apply_snapshot(&mut self, entries: Vec<ChatSummaryEntry>) {
        let mut deduplicated: Vec<ChatSummaryEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduplicated
                .iter_mut()
                .find(|existing| existing.room_id == entry.room_id)
            {
                Some(existing) if existing.last_message_time < entry.last_message_time => {
                    *existing = entry;
                }
                Some(_) => {}
                None => deduplicated.push(entry),
            }
        }
        self.entries = deduplicated;
        self.sort();
        tracing::debug!("Loaded {} chat summaries", self.entries.len());
    }

    /// Fold a message event into the list.
    ///
    /// Returns `false` if the counterpart could not be derived from the event.
    pub fn apply_message(&mut self, message: &IncomingMessage) -> bool {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.room_id == message.room_id)
        {
            entry.last_message = message.text.clone();
            entry.last_message_time = message.timestamp;
            self.sort();
            return true;
        }

        let Some(entry) = self.synthesize_entry(message) else {
            tracing::warn!(
                "Cannot derive counterpart for room '{}', skipping summary",
                message.room_id
            );
            return false;
        };
        self.entries.insert(0, entry);
        self.sort();

        true
    }

    pub fn remove(&mut self, room_id: &RoomId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.room_id != room_id);
        self.entries.len() != before
    }

    /// Drop every entry; the next `load_all` asks the server again.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.snapshot_requested = false;
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[ChatSummaryEntry] {
        &self.entries
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&ChatSummaryEntry> {
        self.entries.iter().find(|entry| &entry.room_id == room_id)
    }

    /// The counterpart is whichever of sender/receiver is not the local user.
    fn synthesize_entry(&self, message: &IncomingMessage) -> Option<ChatSummaryEntry> {
        let (counterpart_id, nickname) = if message.sender_id == self.local_user {
            let receiver = message.receiver_id.clone()?;
            (receiver, message.receiver_nickname.clone())
        } else {
            (message.sender_id.clone(), message.sender_nickname.clone())
        };
        let counterpart_nickname = nickname.unwrap_or_else(|| counterpart_id.to_string());

        Some(ChatSummaryEntry {
            room_id: message.room_id.clone(),
            counterpart_id,
            counterpart_nickname,
            last_message: message.text.clone(),
            last_message_time: message.timestamp,
        })
    }

    /// Stable sort, newest first.
    fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    }
}

impl InboundListener for ChatSummaryAggregator {
    fn on_inbound(&mut self, event: &InboundEvent) -> Option<SessionNotice> {
        match event {
            InboundEvent::AllSummariesLoaded(entries) => {
                self.apply_snapshot(entries.clone());
                Some(SessionNotice::SummariesChanged)
            }
            InboundEvent::MessageReceived(message) => self
                .apply_message(message)
                .then_some(SessionNotice::SummariesChanged),
            _ => None,
        }
    }
}
