//! Direct chat lookup and creation
//!
//! A direct chat is a room with exactly two participants that is not flagged
//! as a group. Before opening a new one between two users, the chats of the
//! first user are scanned for an existing match.

use tracing::{info, instrument, warn};

use super::CHATS;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{decode_all, ChatRoom, Record};
use crate::store::{DocumentStore, Query};

/// Result of opening a direct chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectChat {
    pub chat_id: String,
    /// Whether a new room was created.
    pub created: bool,
}

/// Whether `chat` is the direct chat between `a` and `b`.
pub fn is_direct_between(chat: &ChatRoom, a: &str, b: &str) -> bool {
    !chat.is_group
        && chat.participants.len() == 2
        && chat.has_participant(a)
        && chat.has_participant(b)
}

/// Find the existing direct chat between `a` and `b`.
///
/// Only chats where `a` participates are fetched; the match on `b` and the
/// participant count is done client-side.
pub async fn find_direct_chat(
    store: &dyn DocumentStore,
    a: &str,
    b: &str,
) -> ServiceResult<Option<String>> {
    let query = Query::collection(CHATS)
        .array_contains("participants", a)
        .where_eq("isGroup", false);
    let chats: Vec<ChatRoom> = decode_all(store.query(&query).await?);
    Ok(chats
        .into_iter()
        .find(|chat| is_direct_between(chat, a, b))
        .map(|chat| chat.id))
}

/// Reuse the direct chat between `a` and `b`, or create it.
///
/// A failed lookup is logged and treated as "not found"; the search is not
/// retried.
#[instrument(skip(store))]
pub async fn open_direct_chat(
    store: &dyn DocumentStore,
    a: &str,
    b: &str,
) -> ServiceResult<DirectChat> {
    if a == b {
        return Err(ServiceError::validation("Cannot start a chat with yourself"));
    }

    match find_direct_chat(store, a, b).await {
        Ok(Some(chat_id)) => {
            return Ok(DirectChat {
                chat_id,
                created: false,
            })
        }
        Ok(None) => {}
        Err(e) => warn!("Direct chat lookup failed, creating a new chat: {}", e),
    }

    let room = ChatRoom::new(vec![a.to_string(), b.to_string()], None);
    let chat_id = store.add(CHATS, room.to_fields()?).await?;
    info!(chat_id = %chat_id, "Direct chat created");
    Ok(DirectChat {
        chat_id,
        created: true,
    })
}
