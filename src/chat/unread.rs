//! Unread counters
//!
//! Every chat carries a participant -> count map. Opening a chat resets the
//! viewer's entry to zero. Whether sending bumps the other participants'
//! entries is decided by [`UnreadPolicy`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CHATS;
use crate::error::ServiceResult;
use crate::models::ChatRoom;
use crate::store::{DocumentStore, Fields, Write};

/// What happens to the other participants' counters when a message is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnreadPolicy {
    /// Atomically add one to every participant's counter except the sender's.
    #[default]
    IncrementOthers,
    /// Leave counters alone; only reads reset them.
    Manual,
}

fn counter_path(uid: &str) -> String {
    format!("unreadCount.{}", uid)
}

/// Unread count for `uid`; a missing entry reads as zero.
pub fn unread_for(chat: &ChatRoom, uid: &str) -> u32 {
    chat.unread_count.get(uid).copied().unwrap_or(0)
}

/// Sum of `uid`'s unread counts across chats.
pub fn total_unread(chats: &[ChatRoom], uid: &str) -> u32 {
    chats.iter().map(|c| unread_for(c, uid)).sum()
}

/// Participants whose counter a message from `sender` bumps.
pub fn recipients<'a>(chat: &'a ChatRoom, sender: &'a str) -> Vec<&'a str> {
    chat.others(sender).collect()
}

/// Reset `uid`'s counter on `chat_id` to exactly zero.
pub async fn mark_read(store: &dyn DocumentStore, chat_id: &str, uid: &str) -> ServiceResult<()> {
    let mut fields = Fields::new();
    fields.insert(counter_path(uid), 0.into());
    store.update(CHATS, chat_id, fields).await?;
    debug!(chat_id, user_id = uid, "Marked chat read");
    Ok(())
}

/// Counter bumps for a message from `sender`, to be committed in the same
/// batch as the message itself. `None` when the policy leaves counters alone.
pub fn unread_increment(chat: &ChatRoom, sender: &str, policy: UnreadPolicy) -> Option<Write> {
    if policy == UnreadPolicy::Manual {
        return None;
    }
    let deltas: Vec<(String, i64)> = recipients(chat, sender)
        .into_iter()
        .map(|uid| (counter_path(uid), 1))
        .collect();
    if deltas.is_empty() {
        return None;
    }
    Some(Write::Increment {
        collection: CHATS.to_string(),
        id: chat.id.clone(),
        deltas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::store::memory::MemoryStore;

    async fn seeded(store: &MemoryStore, counts: &[(&str, u32)]) -> ChatRoom {
        let mut chat = ChatRoom::new(counts.iter().map(|(u, _)| u.to_string()).collect(), None);
        for (uid, n) in counts {
            chat.unread_count.insert(uid.to_string(), *n);
        }
        chat.id = store.add(CHATS, chat.to_fields().unwrap()).await.unwrap();
        chat
    }

    async fn reload(store: &MemoryStore, id: &str) -> ChatRoom {
        ChatRoom::from_document(store.get(CHATS, id).await.unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_policy_config_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: UnreadPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"increment-others\"").unwrap();
        assert_eq!(w.policy, UnreadPolicy::IncrementOthers);
        let w: Wrapper = toml::from_str("policy = \"manual\"").unwrap();
        assert_eq!(w.policy, UnreadPolicy::Manual);
        assert_eq!(UnreadPolicy::default(), UnreadPolicy::IncrementOthers);
    }

    #[test]
    fn test_missing_entry_reads_zero() {
        let mut chat = ChatRoom::new(vec!["a".to_string(), "b".to_string()], None);
        chat.unread_count.remove("b");
        chat.unread_count.insert("a".to_string(), 4);
        assert_eq!(unread_for(&chat, "a"), 4);
        assert_eq!(unread_for(&chat, "b"), 0);

        let other = ChatRoom::new(vec!["a".to_string(), "c".to_string()], None);
        assert_eq!(total_unread(&[chat, other], "a"), 4);
    }

    #[tokio::test]
    async fn test_mark_read_resets_to_zero() {
        let store = MemoryStore::new();
        for prior in [0, 1, 57] {
            let chat = seeded(&store, &[("a", prior), ("b", 3)]).await;
            mark_read(&store, &chat.id, "a").await.unwrap();

            let chat = reload(&store, &chat.id).await;
            assert_eq!(unread_for(&chat, "a"), 0);
            assert_eq!(unread_for(&chat, "b"), 3);
        }
    }

    #[tokio::test]
    async fn test_mark_read_missing_chat_fails() {
        let store = MemoryStore::new();
        let err = mark_read(&store, "nope", "a").await.unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[tokio::test]
    async fn test_increment_others_skips_sender() {
        let store = MemoryStore::new();
        let chat = seeded(&store, &[("a", 0), ("b", 2), ("c", 0)]).await;
        let bump = unread_increment(&chat, "a", UnreadPolicy::IncrementOthers).unwrap();
        store.commit(vec![bump]).await.unwrap();

        let chat = reload(&store, &chat.id).await;
        assert_eq!(unread_for(&chat, "a"), 0);
        assert_eq!(unread_for(&chat, "b"), 3);
        assert_eq!(unread_for(&chat, "c"), 1);
    }

    #[test]
    fn test_manual_policy_leaves_counters() {
        let chat = ChatRoom::new(vec!["a".to_string(), "b".to_string()], None);
        assert_eq!(unread_increment(&chat, "a", UnreadPolicy::Manual), None);
    }
}
