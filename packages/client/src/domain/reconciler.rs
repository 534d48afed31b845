//! Message view of the active room.
//!
//! Locally sent messages are shown immediately (optimistic) and tagged; the
//! server's broadcast of the same message (the self-echo) must not show it a
//! second time. Server history always replaces the local view.

use super::{
    entity::{ChatMessage, HistoryEntry, IncomingMessage, MessageOrigin},
    error::SessionError,
    event::{InboundEvent, OutboundEvent},
    listener::{InboundListener, SessionNotice},
    port::EventSink,
    value_object::{ClientTag, MessageText, RoomId, Timestamp, UserId},
};

/// Upper bound on remembered local sends awaiting their echo.
const MAX_PENDING_SENDS: usize = 64;

/// How inbound messages sent by the local user are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoPolicy {
    /// Drop every inbound message whose sender is the local user.
    #[default]
    SuppressSelf,
    /// Drop only echoes of sends made by this client; self-sent messages from
    /// another device are displayed.
    MatchPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomViewState {
    Idle,
    AwaitingHistory,
    Live,
}

/// The room currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRoom {
    pub room_id: RoomId,
    pub counterpart_id: Option<UserId>,
    pub counterpart_nickname: Option<String>,
}

impl ActiveRoom {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            counterpart_id: None,
            counterpart_nickname: None,
        }
    }

    pub fn with_counterpart(mut self, counterpart_id: UserId, nickname: Option<String>) -> Self {
        self.counterpart_id = Some(counterpart_id);
        self.counterpart_nickname = nickname;
        self
    }
}

#[derive(Debug, Clone)]
struct PendingSend {
    tag: ClientTag,
    text: String,
    timestamp: Timestamp,
}

impl PendingSend {
    fn matches(&self, message: &IncomingMessage) -> bool {
        match message.client_tag {
            Some(tag) => tag == self.tag,
            None => message.text == self.text && message.timestamp == self.timestamp,
        }
    }
}

/// What happened to an inbound live message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingOutcome {
    Appended,
    SelfEcho,
    OtherRoom,
    NotActive,
}

pub struct MessageReconciler {
    local_user: UserId,
    echo_policy: EchoPolicy,
    active: Option<ActiveRoom>,
    state: RoomViewState,
    messages: Vec<ChatMessage>,
    pending: Vec<PendingSend>,
    read_position: Option<usize>,
}

impl MessageReconciler {
    pub fn new(local_user: UserId, echo_policy: EchoPolicy) -> Self {
        Self {
            local_user,
            echo_policy,
            active: None,
            state: RoomViewState::Idle,
            messages: Vec::new(),
            pending: Vec::new(),
            read_position: None,
        }
    }

    /// Start displaying a room. Any previous view is discarded; the view waits
    /// for the room's history.
    pub fn activate(&mut self, room: ActiveRoom) {
        tracing::debug!("Displaying room '{}'", room.room_id);
        self.active = Some(room);
        self.state = RoomViewState::AwaitingHistory;
        self.messages.clear();
        self.pending.clear();
        self.read_position = None;
    }

    /// Stop displaying the current room, returning it.
    pub fn deactivate(&mut self) -> Option<ActiveRoom> {
        let room = self.active.take();
        self.state = RoomViewState::Idle;
        self.messages.clear();
        self.pending.clear();
        self.read_position = None;
        room
    }

    /// Send a message in the active room.
    ///
    /// The message is appended to the view before being emitted, stamped with
    /// `now` and a fresh client tag.
    pub fn send(
        &mut self,
        text: String,
        now: Timestamp,
        sink: &dyn EventSink,
    ) -> Result<ChatMessage, SessionError> {
        let text = MessageText::new(text)?;
        let room = self.active.as_ref().ok_or(SessionError::NoActiveRoom)?;
        let receiver_id = room
            .counterpart_id
            .clone()
            .ok_or(SessionError::NoCounterpart)?;
        if !sink.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let tag = ClientTag::generate();
        let message = ChatMessage {
            room_id: room.room_id.clone(),
            sender_id: self.local_user.clone(),
            receiver_id: Some(receiver_id.clone()),
            text: text.as_str().to_string(),
            timestamp: now,
            origin: MessageOrigin::Local(tag),
        };
        self.insert_ordered(message.clone());
        self.remember_pending(PendingSend {
            tag,
            text: message.text.clone(),
            timestamp: now,
        });

        sink.emit(OutboundEvent::SendMessage {
            room_id: message.room_id.clone(),
            sender_id: self.local_user.clone(),
            receiver_id,
            text,
            timestamp: now,
            client_tag: tag,
        });

        Ok(message)
    }

    /// Replace the view with server history (last write wins).
    ///
    /// Returns `false` when the history belongs to another room or no room is
    /// displayed.
    pub fn apply_history(&mut self, room_id: Option<&RoomId>, entries: &[HistoryEntry]) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        if room_id.is_some_and(|id| id != &active.room_id) {
            tracing::debug!("Ignoring history for room '{:?}'", room_id);
            return false;
        }

        let active_id = active.room_id.clone();
        let mut messages: Vec<ChatMessage> = entries
            .iter()
            .cloned()
            .map(|entry| entry.into_chat_message(active_id.clone()))
            .collect();
        messages.sort_by_key(|message| message.timestamp);
        self.messages = messages;
        self.state = RoomViewState::Live;
        self.advance_read_position();

        true
    }

    /// Apply a live message pushed by the server.
    pub fn apply_incoming(&mut self, message: &IncomingMessage) -> IncomingOutcome {
        if self.active.is_none() {
            return IncomingOutcome::NotActive;
        }

        if message.sender_id == self.local_user {
            let matched = self.take_pending(message);
            if matched || self.echo_policy == EchoPolicy::SuppressSelf {
                tracing::debug!("Dropping self-echo in room '{}'", message.room_id);
                return IncomingOutcome::SelfEcho;
            }
        }

        let in_active_room = self
            .active
            .as_ref()
            .is_some_and(|active| active.room_id == message.room_id);
        if !in_active_room {
            return IncomingOutcome::OtherRoom;
        }

        self.insert_ordered(message.to_chat_message());
        IncomingOutcome::Appended
    }

    pub fn active_room(&self) -> Option<&ActiveRoom> {
        self.active.as_ref()
    }

    pub fn state(&self) -> RoomViewState {
        self.state
    }

    /// Messages of the active room, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Index of the newest message; advances on every mutation.
    pub fn read_position(&self) -> Option<usize> {
        self.read_position
    }

    /// Insert keeping timestamp order; equal timestamps keep arrival order.
    fn insert_ordered(&mut self, message: ChatMessage) {
        let index = self
            .messages
            .partition_point(|existing| existing.timestamp <= message.timestamp);
        self.messages.insert(index, message);
        self.advance_read_position();
    }

    fn advance_read_position(&mut self) {
        self.read_position = self.messages.len().checked_sub(1);
    }

    fn remember_pending(&mut self, send: PendingSend) {
        if self.pending.len() == MAX_PENDING_SENDS {
            self.pending.remove(0);
        }
        self.pending.push(send);
    }

    fn take_pending(&mut self, message: &IncomingMessage) -> bool {
        match self.pending.iter().position(|send| send.matches(message)) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }
}

impl InboundListener for MessageReconciler {
    fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    fn on_inbound(&mut self, event: &InboundEvent) -> Option<SessionNotice> {
        match event {
            InboundEvent::HistoryLoaded { room_id, messages } => {
                if self.apply_history(room_id.as_ref(), messages) {
                    let room_id = self.active.as_ref()?.room_id.clone();
                    Some(SessionNotice::HistoryReplaced {
                        room_id,
                        count: self.messages.len(),
                    })
                } else {
                    None
                }
            }
            InboundEvent::MessageReceived(message) => match self.apply_incoming(message) {
                IncomingOutcome::Appended => {
                    Some(SessionNotice::MessageAppended(message.to_chat_message()))
                }
                _ => None,
            },
            _ => None,
        }
    }
}
