//! Chat service over a document store

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use super::direct::{self, DirectChat};
use super::ordering::sorted;
use super::unread::{self, UnreadPolicy};
use super::{messages_path, CHATS};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{decode_all, ChatRoom, Message, Record};
use crate::store::{new_document_id, Direction, DocumentStore, Fields, Query, Subscription, Write};

/// Longest message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Default page of messages shown in a room.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn DocumentStore>,
    unread_policy: UnreadPolicy,
    message_limit: usize,
}

fn chats_for(uid: &str) -> Query {
    Query::collection(CHATS).array_contains("participants", uid)
}

/// Newest `limit` messages, newest first on the wire.
fn recent_messages(chat_id: &str, limit: usize) -> Query {
    Query::collection(messages_path(chat_id))
        .order_by("timestamp", Direction::Descending)
        .limit(limit)
}

/// Decode a message page and put it back in chronological order.
fn chronological(chat_id: &str, docs: Vec<crate::store::Document>) -> Vec<Message> {
    let mut messages: Vec<Message> = decode_all::<Message>(docs)
        .into_iter()
        .map(|m| m.with_chat_id(chat_id))
        .collect();
    messages.reverse();
    messages
}

/// Trim and bound a message body.
pub fn validate_text(text: &str) -> ServiceResult<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ServiceError::validation("Message cannot be empty"));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ServiceError::validation(format!(
            "Message is too long (max {} characters)",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(text)
}

impl ChatService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            unread_policy: UnreadPolicy::default(),
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    pub fn with_unread_policy(mut self, policy: UnreadPolicy) -> Self {
        self.unread_policy = policy;
        self
    }

    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit.max(1);
        self
    }

    /// Create a room. Duplicate ids are dropped (first occurrence wins) and
    /// at least two distinct participants are required.
    #[instrument(skip(self))]
    pub async fn create_chat_room(
        &self,
        participants: &[String],
        chat_name: Option<String>,
    ) -> ServiceResult<String> {
        let mut unique: Vec<String> = Vec::with_capacity(participants.len());
        for p in participants {
            let p = p.trim();
            if !p.is_empty() && !unique.iter().any(|u| u == p) {
                unique.push(p.to_string());
            }
        }
        if unique.len() < 2 {
            return Err(ServiceError::validation(
                "A chat needs at least two participants",
            ));
        }
        let chat_name = chat_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let room = ChatRoom::new(unique, chat_name);
        let id = self.store.add(CHATS, room.to_fields()?).await?;
        info!(chat_id = %id, is_group = room.is_group, "Chat room created");
        Ok(id)
    }

    pub async fn get_chat_room(&self, chat_id: &str) -> ServiceResult<ChatRoom> {
        let doc = self
            .store
            .get(CHATS, chat_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("chat", chat_id))?;
        ChatRoom::from_document(doc)
    }

    /// One-shot chat list for `uid`, in display order.
    pub async fn get_user_chats(&self, uid: &str) -> ServiceResult<Vec<ChatRoom>> {
        let docs = self.store.query(&chats_for(uid)).await?;
        Ok(sorted(decode_all(docs)))
    }

    /// Live chat list for `uid`; every snapshot arrives re-sorted.
    pub fn watch_user_chats(&self, uid: &str) -> Subscription<Vec<ChatRoom>> {
        self.store
            .listen(chats_for(uid))
            .map(|docs| Ok(sorted(decode_all(docs))))
    }

    /// Latest messages of a room, oldest first.
    pub async fn get_messages(&self, chat_id: &str, limit: usize) -> ServiceResult<Vec<Message>> {
        let docs = self.store.query(&recent_messages(chat_id, limit)).await?;
        Ok(chronological(chat_id, docs))
    }

    /// Live message page of a room, oldest first.
    pub fn watch_messages(&self, chat_id: &str) -> Subscription<Vec<Message>> {
        let owned = chat_id.to_string();
        self.store
            .listen(recent_messages(chat_id, self.message_limit))
            .map(move |docs| Ok(chronological(&owned, docs)))
    }

    /// Post a message, update the room's last-message fields and apply the
    /// unread policy.
    #[instrument(skip(self, text))]
    pub async fn send_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
    ) -> ServiceResult<Message> {
        let text = validate_text(text)?;
        let chat = self.get_chat_room(chat_id).await?;
        if !chat.has_participant(sender_id) {
            return Err(ServiceError::validation(
                "You are not a participant in this chat",
            ));
        }

        let mut message = Message::new(chat_id, sender_id, text);
        message.id = new_document_id();

        let mut last = Fields::new();
        last.insert("lastMessage".into(), Value::from(text));
        last.insert(
            "lastMessageTime".into(),
            Value::from(message.timestamp.timestamp_millis()),
        );
        last.insert("lastMessageSenderId".into(), Value::from(sender_id));

        // One batch, so a reader never sees the message before its counter bump.
        let mut writes = vec![
            Write::Create {
                collection: messages_path(chat_id),
                id: message.id.clone(),
                fields: message.to_fields()?,
            },
            Write::Update {
                collection: CHATS.to_string(),
                id: chat_id.to_string(),
                fields: last,
            },
        ];
        writes.extend(unread::unread_increment(&chat, sender_id, self.unread_policy));
        self.store.commit(writes).await?;

        info!(message_id = %message.id, "Message sent");
        Ok(message)
    }

    pub async fn open_direct_chat(&self, a: &str, b: &str) -> ServiceResult<DirectChat> {
        direct::open_direct_chat(self.store.as_ref(), a, b).await
    }

    /// Reset `uid`'s unread counter on entering a room.
    pub async fn mark_read(&self, chat_id: &str, uid: &str) -> ServiceResult<()> {
        unread::mark_read(self.store.as_ref(), chat_id, uid).await
    }
}
