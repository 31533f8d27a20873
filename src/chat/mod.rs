//! Chat rooms and messages
//!
//! The list ordering, direct-chat dedup and unread bookkeeping rules live in
//! their own modules; `ChatService` strings them together over a
//! `DocumentStore`.

pub mod direct;
pub mod display;
pub mod ordering;
mod service;
pub mod unread;

pub use direct::DirectChat;
pub use ordering::sort_chats;
pub use service::{ChatService, DEFAULT_MESSAGE_LIMIT, MAX_MESSAGE_CHARS};
pub use unread::UnreadPolicy;

/// Chat room collection.
pub const CHATS: &str = "chats";

/// User profile collection.
pub const USERS: &str = "users";

/// Messages subcollection of a chat room.
pub fn messages_path(chat_id: &str) -> String {
    format!("{}/{}/messages", CHATS, chat_id)
}
