//! Message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;

/// Message content kind. Only plain text is sent today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
}

/// A chat message, stored under `chats/{chat_id}/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub id: String,
    /// Owning chat, taken from the document path.
    #[serde(skip)]
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(chat_id: &str, sender_id: &str, text: &str) -> Self {
        Self {
            id: String::new(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            message_type: MessageType::Text,
            timestamp: Utc::now(),
            edited: false,
            edited_at: None,
        }
    }

    pub fn with_chat_id(mut self, chat_id: &str) -> Self {
        self.chat_id = chat_id.to_string();
        self
    }
}

impl Record for Message {
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
