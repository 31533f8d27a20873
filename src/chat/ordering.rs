//! Chat list ordering

use std::cmp::Ordering;

use crate::models::ChatRoom;

/// Order chats for display: newest last message first, chats that never had
/// a message after every chat that did. The sort is stable, so ties keep
/// their snapshot order.
///
/// Call this on every snapshot; the list is never maintained incrementally.
pub fn sort_chats(chats: &mut [ChatRoom]) {
    chats.sort_by(|a, b| match (a.last_message_time, b.last_message_time) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Owned variant for snapshot pipelines.
pub fn sorted(mut chats: Vec<ChatRoom>) -> Vec<ChatRoom> {
    sort_chats(&mut chats);
    chats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn chat(id: &str, millis: Option<i64>) -> ChatRoom {
        let mut chat = ChatRoom::new(vec!["a".to_string(), "b".to_string()], None);
        chat.id = id.to_string();
        chat.last_message_time = millis.and_then(DateTime::from_timestamp_millis);
        chat
    }

    fn ids(chats: &[ChatRoom]) -> Vec<&str> {
        chats.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_sort_missing_timestamps_last() {
        let chats = sorted(vec![chat("1", Some(100)), chat("2", None), chat("3", Some(200))]);
        assert_eq!(ids(&chats), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let chats = sorted(vec![
            chat("a", None),
            chat("b", Some(50)),
            chat("c", None),
            chat("d", Some(50)),
            chat("e", Some(70)),
        ]);
        assert_eq!(ids(&chats), vec!["e", "b", "d", "a", "c"]);
    }

    #[test]
    fn test_sort_every_timestamped_before_untimestamped() {
        let mut chats: Vec<ChatRoom> = (0..20)
            .map(|i| chat(&i.to_string(), (i % 3 != 0).then_some(i * 7 % 11)))
            .collect();
        sort_chats(&mut chats);

        let first_none = chats
            .iter()
            .position(|c| c.last_message_time.is_none())
            .unwrap();
        assert!(chats[first_none..]
            .iter()
            .all(|c| c.last_message_time.is_none()));
        assert!(chats[..first_none]
            .windows(2)
            .all(|w| w[0].last_message_time >= w[1].last_message_time));
    }

    #[test]
    fn test_sort_empty() {
        let mut chats: Vec<ChatRoom> = Vec::new();
        sort_chats(&mut chats);
        assert!(chats.is_empty());
    }
}
