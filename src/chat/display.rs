//! Display helpers shared by the CLI and TUI

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::models::{ChatRoom, Message, UserProfile};

/// Chat list placeholder for rooms without messages.
pub const NO_MESSAGES_YET: &str = "No messages yet";

/// Chat list time label: `HH:MM` within the last 24 hours, `Mon D` before.
pub fn chat_time_label<Tz: TimeZone>(time: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(time) = time else {
        return String::new();
    };
    let local = time.with_timezone(&now.timezone());
    if now.clone().signed_duration_since(local.clone()) < Duration::hours(24) {
        local.format("%H:%M").to_string()
    } else {
        local.format("%b %-d").to_string()
    }
}

/// Date separator label: `Today`, `Yesterday`, else `Mon D, YYYY`.
pub fn date_separator_label<Tz: TimeZone>(time: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let day = time.with_timezone(&now.timezone()).date_naive();
    let today = now.date_naive();
    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%b %-d, %Y").to_string()
    }
}

/// A row of the message view.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineItem<'a> {
    Separator(String),
    Message(&'a Message),
}

/// Interleave date separators with chronologically ordered messages. A
/// separator precedes the first message and every message whose calendar
/// day differs from the one before it.
pub fn timeline<'a, Tz: TimeZone>(messages: &'a [Message], now: &DateTime<Tz>) -> Vec<TimelineItem<'a>>
where
    Tz::Offset: std::fmt::Display,
{
    timeline_after(messages, now, None)
}

/// Like [`timeline`], continuing after messages from `previous_day` were
/// already shown, so a batch on that same day gets no leading separator.
pub fn timeline_after<'a, Tz: TimeZone>(
    messages: &'a [Message],
    now: &DateTime<Tz>,
    mut previous_day: Option<NaiveDate>,
) -> Vec<TimelineItem<'a>>
where
    Tz::Offset: std::fmt::Display,
{
    let tz = now.timezone();
    let mut items = Vec::with_capacity(messages.len() + 1);
    for message in messages {
        let day = message.timestamp.with_timezone(&tz).date_naive();
        if previous_day != Some(day) {
            items.push(TimelineItem::Separator(date_separator_label(
                message.timestamp,
                now,
            )));
            previous_day = Some(day);
        }
        items.push(TimelineItem::Message(message));
    }
    items
}

/// Name to show for a chat as seen by `me`.
///
/// Groups use their name; direct chats use the other participant's profile.
pub fn chat_display_name(
    chat: &ChatRoom,
    me: &str,
    profiles: &HashMap<String, UserProfile>,
) -> String {
    if chat.is_group {
        return chat
            .chat_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Group Chat".to_string());
    }
    chat.others(me)
        .next()
        .and_then(|uid| profiles.get(uid))
        .map(|p| p.label().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| "Unknown User".to_string())
}

/// Participant ids whose profiles the chat list needs, deduplicated.
pub fn profile_ids_for(chats: &[ChatRoom], me: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for chat in chats.iter().filter(|c| !c.is_group) {
        for uid in chat.others(me) {
            if !ids.iter().any(|i| i == uid) {
                ids.push(uid.to_string());
            }
        }
    }
    ids
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Chats whose display name or last message contains `query`, ignoring case.
pub fn filter_chats<'a>(
    chats: &'a [ChatRoom],
    query: &str,
    name_of: impl Fn(&ChatRoom) -> String,
) -> Vec<&'a ChatRoom> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return chats.iter().collect();
    }
    chats
        .iter()
        .filter(|c| {
            contains_ci(&name_of(c), &needle)
                || c.last_message
                    .as_deref()
                    .is_some_and(|m| contains_ci(m, &needle))
        })
        .collect()
}

/// Users whose display name or email contains `query`, ignoring case.
pub fn filter_users<'a>(users: &'a [UserProfile], query: &str) -> Vec<&'a UserProfile> {
    let needle = query.trim().to_lowercase();
    users
        .iter()
        .filter(|u| {
            needle.is_empty()
                || contains_ci(&u.email, &needle)
                || u.display_name
                    .as_deref()
                    .is_some_and(|n| contains_ci(n, &needle))
        })
        .collect()
}

/// Single-line preview of a last message, cut to `max` characters.
pub fn preview(text: Option<&str>, max: usize) -> String {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return NO_MESSAGES_YET.to_string();
    };
    let line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= max {
        return line;
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn msg(ts: &str, text: &str) -> Message {
        let mut m = Message::new("c1", "a", text);
        m.timestamp = at(ts);
        m
    }

    fn profile(id: &str, email: &str, name: Option<&str>) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: email.to_string(),
            display_name: name.map(String::from),
            profile_image: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_chat_time_label() {
        let now = at("2024-03-10T12:00:00Z");
        assert_eq!(chat_time_label(Some(at("2024-03-10T08:05:00Z")), &now), "08:05");
        assert_eq!(chat_time_label(Some(at("2024-03-09T13:00:00Z")), &now), "13:00");
        assert_eq!(chat_time_label(Some(at("2024-03-09T11:00:00Z")), &now), "Mar 9");
        assert_eq!(chat_time_label(None, &now), "");
    }

    #[test]
    fn test_time_label_uses_viewer_timezone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at("2024-03-10T12:00:00Z").with_timezone(&tz);
        assert_eq!(chat_time_label(Some(at("2024-03-10T08:05:00Z")), &now), "10:05");
    }

    #[test]
    fn test_date_separator_labels() {
        let now = at("2024-03-10T12:00:00Z");
        assert_eq!(date_separator_label(at("2024-03-10T00:00:01Z"), &now), "Today");
        assert_eq!(date_separator_label(at("2024-03-09T23:59:00Z"), &now), "Yesterday");
        assert_eq!(date_separator_label(at("2024-01-02T10:00:00Z"), &now), "Jan 2, 2024");
    }

    #[test]
    fn test_timeline_separators_on_day_change() {
        let now = at("2024-03-10T12:00:00Z");
        let messages = vec![
            msg("2024-03-09T10:00:00Z", "a"),
            msg("2024-03-09T11:00:00Z", "b"),
            msg("2024-03-10T09:00:00Z", "c"),
        ];
        let items = timeline(&messages, &now);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], TimelineItem::Separator("Yesterday".to_string()));
        assert_eq!(items[1], TimelineItem::Message(&messages[0]));
        assert_eq!(items[2], TimelineItem::Message(&messages[1]));
        assert_eq!(items[3], TimelineItem::Separator("Today".to_string()));
        assert!(timeline(&[], &now).is_empty());
    }

    #[test]
    fn test_timeline_after_same_day_has_no_separator() {
        let now = at("2024-03-10T12:00:00Z");
        let today = now.date_naive();
        let batch = vec![msg("2024-03-10T11:00:00Z", "later")];
        assert_eq!(
            timeline_after(&batch, &now, Some(today)),
            vec![TimelineItem::Message(&batch[0])]
        );

        let yesterday = today.pred_opt();
        let items = timeline_after(&batch, &now, yesterday);
        assert_eq!(items[0], TimelineItem::Separator("Today".to_string()));
    }

    #[test]
    fn test_chat_display_name_fallbacks() {
        let mut profiles = HashMap::new();
        profiles.insert("b".to_string(), profile("b", "bob@example.com", Some("Bob")));
        profiles.insert("c".to_string(), profile("c", "carol@example.com", None));

        let ab = ChatRoom::new(vec!["a".into(), "b".into()], None);
        let ac = ChatRoom::new(vec!["a".into(), "c".into()], None);
        let ad = ChatRoom::new(vec!["a".into(), "d".into()], None);
        assert_eq!(chat_display_name(&ab, "a", &profiles), "Bob");
        assert_eq!(chat_display_name(&ab, "b", &profiles), "Unknown User");
        assert_eq!(chat_display_name(&ac, "a", &profiles), "carol@example.com");
        assert_eq!(chat_display_name(&ad, "a", &profiles), "Unknown User");

        let group = ChatRoom::new(vec!["a".into(), "b".into(), "c".into()], None);
        assert_eq!(chat_display_name(&group, "a", &profiles), "Group Chat");
        let named = ChatRoom::new(vec!["a".into(), "b".into(), "c".into()], Some("Team".into()));
        assert_eq!(chat_display_name(&named, "a", &profiles), "Team");
    }

    #[test]
    fn test_profile_ids_skip_groups_and_self() {
        let chats = vec![
            ChatRoom::new(vec!["a".into(), "b".into()], None),
            ChatRoom::new(vec!["c".into(), "a".into()], None),
            ChatRoom::new(vec!["a".into(), "b".into(), "d".into()], None),
            ChatRoom::new(vec!["b".into(), "a".into()], None),
        ];
        assert_eq!(profile_ids_for(&chats, "a"), vec!["b", "c"]);
    }

    #[test]
    fn test_filters_ignore_case() {
        let mut chat = ChatRoom::new(vec!["a".into(), "b".into()], None);
        chat.last_message = Some("Lunch tomorrow?".to_string());
        let other = ChatRoom::new(vec!["a".into(), "c".into()], None);
        let chats = vec![chat, other];
        let name_of = |c: &ChatRoom| if c.has_participant("b") { "Bob".to_string() } else { "Carol".to_string() };

        assert_eq!(filter_chats(&chats, "LUNCH", name_of).len(), 1);
        assert_eq!(filter_chats(&chats, "car", name_of).len(), 1);
        assert_eq!(filter_chats(&chats, "  ", name_of).len(), 2);

        let users = vec![
            profile("b", "bob@example.com", Some("Bob Stone")),
            profile("c", "carol@example.com", None),
        ];
        assert_eq!(filter_users(&users, "STONE").len(), 1);
        assert_eq!(filter_users(&users, "example").len(), 2);
        assert_eq!(filter_users(&users, "carol")[0].id, "c");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview(None, 10), NO_MESSAGES_YET);
        assert_eq!(preview(Some("hi\nthere"), 20), "hi there");
        assert_eq!(preview(Some("abcdefghijkl"), 8), "abcde...");
    }
}
