//! Chat commands: list, read, send, open direct/group chats, watch a room.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};

use super::user_error;
use crate::chat::display::{self, TimelineItem};
use crate::chat::unread::unread_for;
use crate::error::ServiceError;
use crate::models::{ChatRoom, Message, UserProfile};
use crate::session::Session;

/// Resolve the profiles the chat list shows names for.
async fn names_for(session: &Session, chats: &[ChatRoom], me: &str) -> HashMap<String, UserProfile> {
    let ids = display::profile_ids_for(chats, me);
    session.profiles.fetch_many(&ids).await
}

fn sender_label(msg: &Message, me: &str, profiles: &HashMap<String, UserProfile>) -> String {
    if msg.sender_id == me {
        return "You".to_string();
    }
    profiles
        .get(&msg.sender_id)
        .map(|p| p.label().to_string())
        .unwrap_or_else(|| msg.sender_id.clone())
}

/// Lines for a batch of messages. `last_day` is the calendar day of the
/// last message already printed; it moves past this batch.
fn timeline_lines<Tz: TimeZone>(
    messages: &[Message],
    me: &str,
    profiles: &HashMap<String, UserProfile>,
    now: &DateTime<Tz>,
    last_day: &mut Option<NaiveDate>,
) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    let tz = now.timezone();
    let mut lines = Vec::new();
    for item in display::timeline_after(messages, now, *last_day) {
        match item {
            TimelineItem::Separator(label) => lines.push(format!("--- {} ---", label)),
            TimelineItem::Message(msg) => {
                let local = msg.timestamp.with_timezone(&tz);
                *last_day = Some(local.date_naive());
                lines.push(format!(
                    "[{}] {}: {}",
                    local.format("%H:%M"),
                    sender_label(msg, me, profiles),
                    msg.text
                ));
            }
        }
    }
    lines
}

/// A chat the signed-in user takes part in.
async fn participant_chat(session: &Session, chat_id: &str, me: &str) -> Result<ChatRoom> {
    let chat = match session.chats.get_chat_room(chat_id).await {
        Ok(chat) => chat,
        Err(ServiceError::NotFound { .. }) => bail!("No chat with id {}", chat_id),
        Err(e) => return Err(user_error(e)),
    };
    if !chat.has_participant(me) {
        bail!("You are not a participant in this chat");
    }
    Ok(chat)
}

/// List the signed-in user's chats (prints to stdout).
pub async fn list_chats(limit: usize, query: Option<String>) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;
    let chats = session
        .chats
        .get_user_chats(&me.uid)
        .await
        .map_err(user_error)?;
    let profiles = names_for(&session, &chats, &me.uid).await;

    let name_of = |c: &ChatRoom| display::chat_display_name(c, &me.uid, &profiles);
    let shown = display::filter_chats(&chats, query.as_deref().unwrap_or(""), name_of);

    println!("\nRecent Chats:");
    println!("{:-<60}", "");

    if shown.is_empty() {
        println!("  (no chats found)");
        return Ok(());
    }

    let now = Local::now();
    for chat in shown.into_iter().take(limit) {
        let unread = unread_for(chat, &me.uid);
        let badge = if unread > 0 {
            format!(" ({} unread)", unread)
        } else {
            String::new()
        };
        println!("{}{}", name_of(chat), badge);
        println!("  ID: {}", chat.id);
        let time = display::chat_time_label(chat.last_message_time, &now);
        if !time.is_empty() {
            println!("  Last: {}", time);
        }
        println!("  {}", display::preview(chat.last_message.as_deref(), 56));
        println!();
    }

    Ok(())
}

/// Print the latest messages of a chat and mark it read.
pub async fn read_messages(chat_id: &str, limit: usize) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;
    let chat = participant_chat(&session, chat_id, &me.uid).await?;
    let messages = session
        .chats
        .get_messages(chat_id, limit)
        .await
        .map_err(user_error)?;
    let profiles = session.profiles.fetch_many(&chat.participants).await;

    if messages.is_empty() {
        println!("(no messages)");
    } else {
        let lines = timeline_lines(&messages, &me.uid, &profiles, &Local::now(), &mut None);
        for line in lines {
            println!("{}", line);
        }
    }

    session
        .chats
        .mark_read(chat_id, &me.uid)
        .await
        .map_err(user_error)?;
    Ok(())
}

pub async fn send_message(chat_id: &str, message: &str) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;
    session
        .chats
        .send_message(chat_id, &me.uid, message)
        .await
        .map_err(user_error)?;
    println!("Message sent.");
    Ok(())
}

/// Open (or reuse) the direct chat with the user registered under `email`.
pub async fn direct_chat(email: &str) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;
    let Some(other) = session
        .profiles
        .find_by_email(email)
        .await
        .map_err(user_error)?
    else {
        bail!("No user found with email {}", email.trim());
    };
    let opened = session
        .chats
        .open_direct_chat(&me.uid, &other.id)
        .await
        .map_err(user_error)?;
    if opened.created {
        println!("Started a chat with {}.", other.label());
    } else {
        println!("Existing chat with {}.", other.label());
    }
    println!("  ID: {}", opened.chat_id);
    Ok(())
}

/// Create a group chat with the users registered under `emails`.
pub async fn group_chat(name: &str, emails: &[String]) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;

    let mut participants = vec![me.uid.clone()];
    for email in emails {
        match session.profiles.find_by_email(email).await.map_err(user_error)? {
            Some(user) => participants.push(user.id),
            None => bail!("No user found with email {}", email.trim()),
        }
    }
    let chat_id = session
        .chats
        .create_chat_room(&participants, Some(name.to_string()))
        .await
        .map_err(user_error)?;
    println!("Group chat created.");
    println!("  ID: {}", chat_id);
    Ok(())
}

/// Follow a chat live until Ctrl+C. New snapshots are diffed against what
/// was already printed.
pub async fn watch(chat_id: &str) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;
    let chat = participant_chat(&session, chat_id, &me.uid).await?;
    let profiles = session.profiles.fetch_many(&chat.participants).await;

    println!("Watching {} (Ctrl+C to stop)", display::chat_display_name(&chat, &me.uid, &profiles));
    println!("{:-<60}", "");

    let mut subscription = session.chats.watch_messages(chat_id);
    let mut printed: HashSet<String> = HashSet::new();
    let mut last_day: Option<NaiveDate> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else { break };
                let messages = match snapshot {
                    Ok(messages) => messages,
                    Err(e) => {
                        tracing::debug!(chat_id, "Live query failed: {}", e);
                        eprintln!("Warning: {}", e.user_message());
                        continue;
                    }
                };
                let fresh: Vec<Message> = messages
                    .into_iter()
                    .filter(|m| !printed.contains(&m.id))
                    .collect();
                if fresh.is_empty() {
                    continue;
                }
                printed.extend(fresh.iter().map(|m| m.id.clone()));
                for line in timeline_lines(&fresh, &me.uid, &profiles, &Local::now(), &mut last_day) {
                    println!("{}", line);
                }
                if let Err(e) = session.chats.mark_read(chat_id, &me.uid).await {
                    tracing::warn!(chat_id, "Failed to mark chat read: {}", e);
                }
            }
        }
    }
    subscription.unsubscribe();
    Ok(())
}
