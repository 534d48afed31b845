//! WebSocket message DTOs.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    /// Presence announcement, sent first on every established link.
    UserOnline(String),
    JoinRoom {
        chat_room_id: String,
        user_id: String,
    },
    LeaveRoom {
        chat_room_id: String,
        user_id: String,
    },
    GetChatHistory {
        chat_room_id: String,
    },
    GetAllChats {
        user_id: String,
    },
    SendMessage {
        chat_room_id: String,
        sender_id: String,
        receiver_id: String,
        message: String,
        /// RFC 3339, stamped by the client
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_tag: Option<String>,
    },
    StartSearching {
        user_id: String,
        #[serde(rename = "type")]
        search_type: String,
        mood: String,
    },
    StopSearching(String),
}

/// Server → client frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerFrame {
    #[serde(alias = "newMessage")]
    ReceiveMessage(WireMessage),
    ChatHistory(HistoryPayload),
    AllChats(Vec<WireEntry<WireChatSummary>>),
    #[serde(alias = "match-found")]
    MatchFound(WireMatch),
    SearchTimeout,
}

/// Timestamps arrive either as RFC 3339 strings or as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_room_id: Option<String>,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub message: String,
    pub timestamp: WireTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_tag: Option<String>,
}

/// One element of a server-sent list.
///
/// An element that does not have the expected shape is kept as raw JSON so
/// the rest of the list still parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireEntry<T> {
    Valid(T),
    Malformed(serde_json::Value),
}

impl<T> WireEntry<T> {
    pub fn valid(&self) -> Option<&T> {
        match self {
            WireEntry::Valid(item) => Some(item),
            WireEntry::Malformed(_) => None,
        }
    }
}

/// History arrives as a bare list or scoped to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum HistoryPayload {
    Scoped {
        chat_room_id: String,
        messages: Vec<WireEntry<WireMessage>>,
    },
    Bare(Vec<WireEntry<WireMessage>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChatSummary {
    pub chat_room_id: String,
    pub receiver_id: String,
    pub receiver_nickname: String,
    pub last_message: String,
    pub last_message_time: WireTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMatch {
    pub chat_room_id: String,
    pub receiver_id: String,
    pub receiver_nickname: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_room_wire_shape() {
        // テスト項目: joinRoom がイベント名と camelCase のフィールドでシリアライズされる
        // given (前提条件):
        let frame = ClientFrame::JoinRoom {
            chat_room_id: "r1".to_string(),
            user_id: "alice".to_string(),
        };

        // when (操作):
        let value = serde_json::to_value(&frame).unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            json!({"event": "joinRoom", "data": {"chatRoomId": "r1", "userId": "alice"}})
        );
    }

    #[test]
    fn test_user_online_and_stop_searching_carry_plain_user_id() {
        // テスト項目: userOnline と stopSearching はユーザー ID の文字列をそのまま送る
        // given (前提条件):
        let online = ClientFrame::UserOnline("alice".to_string());
        let stop = ClientFrame::StopSearching("alice".to_string());

        // when (操作):
        let online = serde_json::to_value(&online).unwrap();
        let stop = serde_json::to_value(&stop).unwrap();

        // then (期待する結果):
        assert_eq!(online, json!({"event": "userOnline", "data": "alice"}));
        assert_eq!(stop, json!({"event": "stopSearching", "data": "alice"}));
    }

    #[test]
    fn test_start_searching_uses_type_field() {
        // テスト項目: startSearching の役割は "type" フィールドで送られる
        // given (前提条件):
        let frame = ClientFrame::StartSearching {
            user_id: "alice".to_string(),
            search_type: "Rizzler".to_string(),
            mood: "Happy".to_string(),
        };

        // when (操作):
        let value = serde_json::to_value(&frame).unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            json!({"event": "startSearching", "data": {"userId": "alice", "type": "Rizzler", "mood": "Happy"}})
        );
    }

    #[test]
    fn test_send_message_omits_missing_client_tag() {
        // テスト項目: clientTag がない場合はフィールド自体が省略される
        // given (前提条件):
        let frame = ClientFrame::SendMessage {
            chat_room_id: "r1".to_string(),
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            message: "hi".to_string(),
            timestamp: "2023-01-01T00:00:00.000Z".to_string(),
            client_tag: None,
        };

        // when (操作):
        let value = serde_json::to_value(&frame).unwrap();

        // then (期待する結果):
        assert_eq!(value["data"].get("clientTag"), None);
        assert_eq!(value["data"]["senderId"], "alice");
    }

    #[test]
    fn test_new_message_alias_is_accepted() {
        // テスト項目: newMessage は receiveMessage として受け付けられる
        // given (前提条件):
        let text = r#"{"event":"newMessage","data":{"chatRoomId":"r1","senderId":"alice","receiverId":"bob","message":"hi","timestamp":"2023-01-01T00:00:00.000Z","senderNickname":"Alice"}}"#;

        // when (操作):
        let frame: ServerFrame = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        let ServerFrame::ReceiveMessage(message) = frame else {
            panic!("expected receiveMessage");
        };
        assert_eq!(message.sender_nickname.as_deref(), Some("Alice"));
        assert_eq!(
            message.timestamp,
            WireTimestamp::Text("2023-01-01T00:00:00.000Z".to_string())
        );
    }

    #[test]
    fn test_match_found_alias_is_accepted() {
        // テスト項目: match-found は matchFound として受け付けられる
        // given (前提条件):
        let text = r#"{"event":"match-found","data":{"chatRoomId":"r9","receiverId":"alice","receiverNickname":"Alice"}}"#;

        // when (操作):
        let frame: ServerFrame = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        assert!(matches!(frame, ServerFrame::MatchFound(m) if m.chat_room_id == "r9"));
    }

    #[test]
    fn test_search_timeout_without_data() {
        // テスト項目: データのない searchTimeout をパースできる
        // given (前提条件):
        let text = r#"{"event":"searchTimeout"}"#;

        // when (操作):
        let frame: ServerFrame = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        assert_eq!(frame, ServerFrame::SearchTimeout);
    }

    #[test]
    fn test_history_bare_and_scoped_forms() {
        // テスト項目: 履歴はリスト形式と部屋付き形式の両方を受け付ける
        // given (前提条件):
        let bare = r#"{"event":"chatHistory","data":[{"senderId":"alice","message":"hi","timestamp":1000}]}"#;
        let scoped = r#"{"event":"chatHistory","data":{"chatRoomId":"r1","messages":[]}}"#;

        // when (操作):
        let bare: ServerFrame = serde_json::from_str(bare).unwrap();
        let scoped: ServerFrame = serde_json::from_str(scoped).unwrap();

        // then (期待する結果):
        let ServerFrame::ChatHistory(HistoryPayload::Bare(messages)) = bare else {
            panic!("expected bare history");
        };
        assert_eq!(
            messages[0].valid().map(|m| m.timestamp.clone()),
            Some(WireTimestamp::Millis(1000))
        );
        assert!(matches!(
            scoped,
            ServerFrame::ChatHistory(HistoryPayload::Scoped { chat_room_id, .. }) if chat_room_id == "r1"
        ));
    }

    #[test]
    fn test_history_entry_with_null_message_does_not_break_the_list() {
        // テスト項目: 本文が null の履歴エントリがあっても、残りのエントリはパースされる
        // given (前提条件):
        let text = r#"{"event":"chatHistory","data":{"chatRoomId":"r1","messages":[
            {"senderId":"alice","message":"hi","timestamp":1000},
            {"senderId":"bob","message":null,"timestamp":2000},
            {"senderId":"bob","message":"yo","timestamp":3000}
        ]}}"#;

        // when (操作):
        let frame: ServerFrame = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        let ServerFrame::ChatHistory(HistoryPayload::Scoped { messages, .. }) = frame else {
            panic!("expected scoped history");
        };
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[1], WireEntry::Malformed(_)));
        let texts: Vec<_> = messages
            .iter()
            .filter_map(WireEntry::valid)
            .map(|m| m.message.as_str())
            .collect();
        assert_eq!(texts, vec!["hi", "yo"]);
    }

    #[test]
    fn test_all_chats_entry_missing_nickname_does_not_break_the_list() {
        // テスト項目: receiverNickname が欠けたサマリーがあっても、残りのサマリーはパースされる
        // given (前提条件):
        let text = r#"{"event":"allChats","data":[
            {"chatRoomId":"r1","receiverId":"bob","lastMessage":"yo","lastMessageTime":1000},
            {"chatRoomId":"r2","receiverId":"carol","receiverNickname":"Carol","lastMessage":"bye","lastMessageTime":2000}
        ]}"#;

        // when (操作):
        let frame: ServerFrame = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        let ServerFrame::AllChats(entries) = frame else {
            panic!("expected allChats");
        };
        assert!(matches!(entries[0], WireEntry::Malformed(_)));
        assert_eq!(
            entries[1].valid().map(|e| e.receiver_nickname.as_str()),
            Some("Carol")
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        // テスト項目: 未知のイベントはパースエラーになる
        // given (前提条件):
        let text = r#"{"event":"typing","data":{"userId":"alice"}}"#;

        // when (操作):
        let result = serde_json::from_str::<ServerFrame>(text);

        // then (期待する結果):
        assert!(result.is_err());
    }
}
