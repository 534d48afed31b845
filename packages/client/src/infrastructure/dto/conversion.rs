//! Conversion logic between wire DTOs and domain events.

use crate::domain::{
    entity::{ChatSummaryEntry, HistoryEntry, IncomingMessage, MatchFound},
    error::ValidationError,
    event::{InboundEvent, OutboundEvent},
    value_object::{ClientTag, RoomId, Timestamp, UserId},
};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// Domain Event → DTO
// ========================================

impl TryFrom<OutboundEvent> for dto::ClientFrame {
    type Error = ValidationError;

    fn try_from(event: OutboundEvent) -> Result<Self, Self::Error> {
        let frame = match event {
            OutboundEvent::AnnouncePresence { user_id } => Self::UserOnline(user_id.into_string()),
            OutboundEvent::JoinRoom { room_id, user_id } => Self::JoinRoom {
                chat_room_id: room_id.into_string(),
                user_id: user_id.into_string(),
            },
            OutboundEvent::LeaveRoom { room_id, user_id } => Self::LeaveRoom {
                chat_room_id: room_id.into_string(),
                user_id: user_id.into_string(),
            },
            OutboundEvent::RequestHistory { room_id } => Self::GetChatHistory {
                chat_room_id: room_id.into_string(),
            },
            OutboundEvent::RequestAllSummaries { user_id } => Self::GetAllChats {
                user_id: user_id.into_string(),
            },
            OutboundEvent::SendMessage {
                room_id,
                sender_id,
                receiver_id,
                text,
                timestamp,
                client_tag,
            } => Self::SendMessage {
                chat_room_id: room_id.into_string(),
                sender_id: sender_id.into_string(),
                receiver_id: receiver_id.into_string(),
                message: text.into_string(),
                timestamp: timestamp.to_rfc3339()?,
                client_tag: Some(client_tag.to_string()),
            },
            OutboundEvent::StartSearch {
                user_id,
                role,
                mood,
            } => Self::StartSearching {
                user_id: user_id.into_string(),
                search_type: role.as_str().to_string(),
                mood: mood.as_str().to_string(),
            },
            OutboundEvent::StopSearch { user_id } => Self::StopSearching(user_id.into_string()),
        };
        Ok(frame)
    }
}

// ========================================
// DTO → Domain Event
// ========================================

impl TryFrom<dto::WireTimestamp> for Timestamp {
    type Error = ValidationError;

    fn try_from(value: dto::WireTimestamp) -> Result<Self, Self::Error> {
        match value {
            dto::WireTimestamp::Millis(millis) => Ok(Timestamp::new(millis)),
            dto::WireTimestamp::Text(text) => Timestamp::from_rfc3339(&text),
        }
    }
}

impl TryFrom<dto::WireMessage> for HistoryEntry {
    type Error = ValidationError;

    fn try_from(wire: dto::WireMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            sender_id: UserId::new(wire.sender_id)?,
            receiver_id: wire.receiver_id.map(UserId::new).transpose()?,
            text: wire.message,
            timestamp: wire.timestamp.try_into()?,
        })
    }
}

impl TryFrom<dto::WireMessage> for IncomingMessage {
    type Error = ValidationError;

    fn try_from(wire: dto::WireMessage) -> Result<Self, Self::Error> {
        let room_id = wire.chat_room_id.ok_or(ValidationError::EmptyRoomId)?;
        Ok(Self {
            room_id: RoomId::new(room_id)?,
            sender_id: UserId::new(wire.sender_id)?,
            receiver_id: wire.receiver_id.map(UserId::new).transpose()?,
            text: wire.message,
            timestamp: wire.timestamp.try_into()?,
            sender_nickname: wire.sender_nickname,
            receiver_nickname: wire.receiver_nickname,
            // An unreadable tag only disables exact echo matching.
            client_tag: wire
                .client_tag
                .and_then(|tag| ClientTag::parse(&tag).ok()),
        })
    }
}

impl TryFrom<dto::WireChatSummary> for ChatSummaryEntry {
    type Error = ValidationError;

    fn try_from(wire: dto::WireChatSummary) -> Result<Self, Self::Error> {
        Ok(Self {
            room_id: RoomId::new(wire.chat_room_id)?,
            counterpart_id: UserId::new(wire.receiver_id)?,
            counterpart_nickname: wire.receiver_nickname,
            last_message: wire.last_message,
            last_message_time: wire.last_message_time.try_into()?,
        })
    }
}

impl TryFrom<dto::WireMatch> for MatchFound {
    type Error = ValidationError;

    fn try_from(wire: dto::WireMatch) -> Result<Self, Self::Error> {
        Ok(Self {
            room_id: RoomId::new(wire.chat_room_id)?,
            counterpart_id: UserId::new(wire.receiver_id)?,
            counterpart_nickname: wire.receiver_nickname,
        })
    }
}

impl TryFrom<dto::ServerFrame> for InboundEvent {
    type Error = ValidationError;

    fn try_from(frame: dto::ServerFrame) -> Result<Self, Self::Error> {
        let event = match frame {
            dto::ServerFrame::ReceiveMessage(wire) => Self::MessageReceived(wire.try_into()?),
            dto::ServerFrame::ChatHistory(payload) => {
                let (room_id, messages) = match payload {
                    dto::HistoryPayload::Scoped {
                        chat_room_id,
                        messages,
                    } => (Some(RoomId::new(chat_room_id)?), messages),
                    dto::HistoryPayload::Bare(messages) => (shared_room_id(&messages), messages),
                };
                Self::HistoryLoaded {
                    room_id,
                    messages: convert_entries(messages, "history message"),
                }
            }
            dto::ServerFrame::AllChats(entries) => {
                Self::AllSummariesLoaded(convert_entries(entries, "chat summary"))
            }
            dto::ServerFrame::MatchFound(wire) => Self::Matched(wire.try_into()?),
            dto::ServerFrame::SearchTimeout => Self::SearchTimedOut,
        };
        Ok(event)
    }
}

/// Room id carried by every message of a bare history list, if they agree.
fn shared_room_id(messages: &[dto::WireEntry<dto::WireMessage>]) -> Option<RoomId> {
    let mut rooms = messages
        .iter()
        .filter_map(dto::WireEntry::valid)
        .map(|message| message.chat_room_id.as_ref());
    let first = rooms.next()??;
    rooms
        .all(|room| room == Some(first))
        .then(|| RoomId::new(first.clone()).ok())
        .flatten()
}

/// Convert list items one by one, dropping the ones that are malformed or do
/// not validate.
fn convert_entries<W, T>(items: Vec<dto::WireEntry<W>>, what: &str) -> Vec<T>
where
    T: TryFrom<W, Error = ValidationError>,
{
    items
        .into_iter()
        .filter_map(|item| match item {
            dto::WireEntry::Valid(wire) => match T::try_from(wire) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Dropping malformed {}: {}", what, e);
                    None
                }
            },
            dto::WireEntry::Malformed(raw) => {
                tracing::warn!("Dropping malformed {}: {}", what, raw);
                None
            }
        })
        .collect()
}
