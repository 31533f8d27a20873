//! Chat room model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;

/// A chat room shared by its participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    #[serde(skip)]
    pub id: String,
    pub participants: Vec<String>,
    /// Display name, set for group chats only.
    #[serde(default)]
    pub chat_name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message: Option<String>,
    /// `None` until the first message is sent.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message_sender_id: Option<String>,
    /// Participant id -> unseen message count.
    #[serde(default)]
    pub unread_count: BTreeMap<String, u32>,
}

impl ChatRoom {
    /// New room with empty last-message fields and a zero counter for every
    /// participant.
    pub fn new(participants: Vec<String>, chat_name: Option<String>) -> Self {
        let unread_count = participants.iter().map(|p| (p.clone(), 0)).collect();
        Self {
            id: String::new(),
            is_group: participants.len() > 2,
            participants,
            chat_name,
            created_at: Some(Utc::now()),
            last_message: None,
            last_message_time: None,
            last_message_sender_id: None,
            unread_count,
        }
    }

    pub fn has_participant(&self, uid: &str) -> bool {
        self.participants.iter().any(|p| p == uid)
    }

    /// Participants other than `uid`, in stored order.
    pub fn others<'a>(&'a self, uid: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.participants
            .iter()
            .map(String::as_str)
            .filter(move |p| *p != uid)
    }
}

impl Record for ChatRoom {
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
