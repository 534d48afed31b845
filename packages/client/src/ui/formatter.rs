//! Message formatting utilities for console display.

use std::fmt::Display;

use yapper_shared::time::timestamp_to_local_clock;

use crate::domain::{
    entity::{ChatMessage, ChatSummaryEntry, MatchFound, SearchRequest},
    value_object::{Mood, RoleChoice, RoomId, Timestamp, UserId},
};

const RULE: &str = "------------------------------------------------------------";
const DOUBLE_RULE: &str = "============================================================";

/// Message formatter for console display
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn format_welcome(user_id: &UserId) -> String {
        format!(
            "\nYou are '{}'. Type /help for commands. Press Ctrl+C to exit.\n",
            user_id
        )
    }

    /// Format a live chat message
    ///
    /// # Arguments
    ///
    /// * `sender_label` - How to show the sender (nickname, id or "me")
    /// * `message` - The message to show
    pub fn format_chat_message(sender_label: &str, message: &ChatMessage) -> String {
        format!(
            "\n\n{RULE}\n@{}: {}\nsent at {}\n{RULE}\n",
            sender_label,
            message.text,
            timestamp_to_local_clock(message.timestamp.value())
        )
    }

    pub fn format_sent_confirmation(sent_at: Timestamp) -> String {
        format!("sent at {}\n", timestamp_to_local_clock(sent_at.value()))
    }

    /// Format the full message list of a room after history arrives
    ///
    /// Messages from `local_user` are shown as "me", others with
    /// `counterpart_label`.
    pub fn format_history(
        room_id: &RoomId,
        counterpart_label: &str,
        messages: &[ChatMessage],
        local_user: &UserId,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{DOUBLE_RULE}\n"));
        output.push_str(&format!("Chat with {} (room {})\n", counterpart_label, room_id));

        if messages.is_empty() {
            output.push_str("(No messages yet)\n");
        } else {
            for message in messages {
                let label = if &message.sender_id == local_user {
                    "me"
                } else {
                    counterpart_label
                };
                output.push_str(&format!(
                    "[{}] {}: {}\n",
                    timestamp_to_local_clock(message.timestamp.value()),
                    label,
                    message.text
                ));
            }
        }

        output.push_str(DOUBLE_RULE);
        output.push('\n');
        output
    }

    /// Format the all-chats list, numbered for `/open <n>`
    pub fn format_summaries(entries: &[ChatSummaryEntry]) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{DOUBLE_RULE}\nAll chats:\n"));

        if entries.is_empty() {
            output.push_str("(No chats yet)\n");
        } else {
            for (index, entry) in entries.iter().enumerate() {
                output.push_str(&format!(
                    "{}. {} - {} ({})\n",
                    index + 1,
                    entry.counterpart_nickname,
                    entry.last_message,
                    timestamp_to_local_clock(entry.last_message_time.value())
                ));
            }
        }

        output.push_str(DOUBLE_RULE);
        output.push('\n');
        output
    }

    pub fn format_room_entered(counterpart_label: &str) -> String {
        format!("\n> Chatting with {}. Loading history...\n", counterpart_label)
    }

    pub fn format_room_left(room_id: &RoomId) -> String {
        format!("\n< Left room {}\n", room_id)
    }

    pub fn format_search_started(request: &SearchRequest) -> String {
        format!(
            "\nSearching as {} feeling {}... (/stop to cancel)\n",
            request.role, request.mood
        )
    }

    pub fn format_search_cancelled() -> String {
        "\nSearch cancelled.\n".to_string()
    }

    pub fn format_search_timed_out() -> String {
        "\nNo match found. Try again with /search.\n".to_string()
    }

    pub fn format_match_found(found: &MatchFound) -> String {
        format!("\n\n*** Matched with {}! ***\n", found.counterpart_nickname)
    }

    pub fn format_connected(reconnected: bool) -> String {
        if reconnected {
            "\n[reconnected]\n".to_string()
        } else {
            "\n[connected to chat server]\n".to_string()
        }
    }

    pub fn format_connection_lost(reason: &str) -> String {
        format!("\n[connection lost: {}; reconnecting...]\n", reason)
    }

    pub fn format_disconnected() -> String {
        "\n[disconnected]\n".to_string()
    }

    pub fn format_error(error: &dyn Display) -> String {
        format!("\n! {}\n", error)
    }

    pub fn format_help() -> String {
        let moods = Mood::ALL.map(|mood| mood.as_str()).join(", ");
        format!(
            "\nCommands:\n\
             \x20 <text>                 send to the open chat\n\
             \x20 /chats                 list all chats\n\
             \x20 /open <n|roomId>       open a chat\n\
             \x20 /leave                 close the open chat\n\
             \x20 /search <mood> <role>  find a partner\n\
             \x20 /stop                  cancel the search\n\
             \x20 /quit                  exit\n\
             Moods: {}\n\
             Roles: {}, {}\n",
            moods,
            RoleChoice::Rizzler,
            RoleChoice::Shawty
        )
    }
}
