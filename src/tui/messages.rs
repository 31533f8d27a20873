//! Messages pane: the open chat's timeline with date separators.

use std::collections::HashMap;

use chrono::{Local, TimeZone};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::chat::display::{timeline, TimelineItem};
use crate::models::{Message, UserProfile};

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// State for the messages pane.
#[derive(Default)]
pub struct MessagesState {
    /// Open chat, if any.
    pub chat_id: Option<String>,
    /// Header text (chat display name).
    pub header: String,
    /// Messages in chronological order.
    pub messages: Vec<Message>,
    /// Waiting for the first snapshot of the open chat.
    pub loading: bool,
    /// Lines scrolled up from the newest message (0 = follow new messages).
    pub scroll_back: usize,
}

impl MessagesState {
    /// Switch to a chat; the timeline stays empty until its first snapshot.
    pub fn open(&mut self, chat_id: &str, header: String) {
        self.chat_id = Some(chat_id.to_string());
        self.header = header;
        self.messages.clear();
        self.loading = true;
        self.scroll_back = 0;
    }

    pub fn close(&mut self) {
        *self = Self::default();
    }

    /// Apply a snapshot. Snapshots for a chat that is no longer open are
    /// ignored; returns whether it was applied.
    pub fn update(&mut self, chat_id: &str, messages: Vec<Message>) -> bool {
        if self.chat_id.as_deref() != Some(chat_id) {
            return false;
        }
        self.messages = messages;
        self.loading = false;
        true
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    /// Jump back to the newest message.
    pub fn follow(&mut self) {
        self.scroll_back = 0;
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the messages pane. `profiles` resolves sender names; the
/// signed-in user shows as "You".
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &MessagesState,
    me: &str,
    profiles: &HashMap<String, UserProfile>,
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if state.chat_id.is_none() {
        let hint = Line::from(Span::styled(
            "Select a chat to start messaging",
            Style::default().fg(Color::DarkGray),
        ));
        let y = inner.y + inner.height / 2;
        Paragraph::new(hint)
            .alignment(Alignment::Center)
            .render(Rect::new(inner.x, y, inner.width, 1), buf);
        return;
    }

    // Reserve the first line for the chat header.
    let header_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_chat_header(header_area, buf, &state.header);

    let messages_area = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if messages_area.height == 0 {
        return;
    }

    let placeholder = if state.loading {
        Some("Loading...")
    } else if state.messages.is_empty() {
        Some("No messages yet. Say hello!")
    } else {
        None
    };
    if let Some(text) = placeholder {
        let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line)
            .alignment(Alignment::Center)
            .render(Rect::new(messages_area.x, messages_area.y, messages_area.width, 1), buf);
        return;
    }

    let all_lines = build_message_lines(
        &state.messages,
        me,
        profiles,
        &Local::now(),
        messages_area.width as usize,
    );
    let total_lines = all_lines.len();
    let visible_height = messages_area.height as usize;
    let scroll = scroll_start(total_lines, visible_height, state.scroll_back);

    for (row, line_idx) in (scroll..total_lines).take(visible_height).enumerate() {
        let y = messages_area.y + row as u16;
        let line_area = Rect::new(messages_area.x, y, messages_area.width, 1);
        Paragraph::new(all_lines[line_idx].clone()).render(line_area, buf);
    }

    // Scroll indicators.
    if total_lines > visible_height {
        let indicator_x = messages_area.x + messages_area.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(indicator_x, messages_area.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if scroll + visible_height < total_lines {
            let bottom_y = messages_area.y + messages_area.height.saturating_sub(1);
            let cell = &mut buf[(indicator_x, bottom_y)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

fn render_chat_header(area: Rect, buf: &mut Buffer, header: &str) {
    let line = Line::from(vec![Span::styled(
        format!(" {} ", header),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// First line to draw: anchored to the bottom, moved up by `scroll_back`.
fn scroll_start(total: usize, height: usize, scroll_back: usize) -> usize {
    let bottom = total.saturating_sub(height);
    bottom.saturating_sub(scroll_back)
}

fn sender_label(sender_id: &str, me: &str, profiles: &HashMap<String, UserProfile>) -> String {
    if sender_id == me {
        return "You".to_string();
    }
    profiles
        .get(sender_id)
        .map(|p| p.label().to_string())
        .unwrap_or_else(|| "Unknown User".to_string())
}

/// Flatten the timeline into display lines.
fn build_message_lines<Tz: TimeZone>(
    messages: &[Message],
    me: &str,
    profiles: &HashMap<String, UserProfile>,
    now: &chrono::DateTime<Tz>,
    width: usize,
) -> Vec<Line<'static>>
where
    Tz::Offset: std::fmt::Display,
{
    let mut lines: Vec<Line<'static>> = Vec::new();
    let tz = now.timezone();

    for item in timeline(messages, now) {
        match item {
            TimelineItem::Separator(label) => {
                if !lines.is_empty() {
                    lines.push(Line::from(""));
                }
                let text = format!(" {} ", label);
                let side = width.saturating_sub(text.chars().count()) / 2;
                lines.push(Line::from(Span::styled(
                    format!("{}{}{}", "-".repeat(side), text, "-".repeat(side)),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            TimelineItem::Message(msg) => {
                let mine = msg.sender_id == me;
                let name_style = if mine {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                };
                let time = msg.timestamp.with_timezone(&tz).format("%H:%M").to_string();
                let mut header = vec![
                    Span::styled(format!(" {}", sender_label(&msg.sender_id, me, profiles)), name_style),
                    Span::styled(format!("  {}", time), Style::default().fg(Color::DarkGray)),
                ];
                if msg.edited {
                    header.push(Span::styled(" (edited)", Style::default().fg(Color::DarkGray)));
                }
                lines.push(Line::from(header));

                for body in wrap_text(&msg.text, width.saturating_sub(4)) {
                    lines.push(Line::from(Span::raw(format!("   {}", body))));
                }
            }
        }
    }
    lines
}

/// Word wrap by character count; words longer than a line are split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;
        for word in line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_width {
                if current_len > 0 {
                    result.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_width);
                result.push(word.into_iter().collect());
                word = rest;
            }
            if current_len == 0 {
                current = word.iter().collect();
                current_len = word.len();
            } else if current_len + 1 + word.len() <= max_width {
                current.push(' ');
                current.extend(word.iter());
                current_len += 1 + word.len();
            } else {
                result.push(std::mem::replace(&mut current, word.iter().collect()));
                current_len = word.len();
            }
        }
        result.push(current);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn msg(sender: &str, text: &str, at: &str) -> Message {
        let mut m = Message::new("c1", sender, text);
        m.timestamp = DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc);
        m
    }

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("hello world foo", 11), vec!["hello world", "foo"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_lines_have_separators_and_names() {
        let now = DateTime::parse_from_rfc3339("2024-03-02T12:00:00+00:00").unwrap();
        let messages = vec![
            msg("bob", "yesterday's note", "2024-03-01T09:00:00Z"),
            msg("me", "morning", "2024-03-02T08:30:00Z"),
        ];
        let lines = build_message_lines(&messages, "me", &HashMap::new(), &now, 40);
        let texts: Vec<String> = lines.iter().map(text_of).collect();

        assert!(texts[0].contains(" Yesterday "));
        assert_eq!(texts[1], " Unknown User  09:00");
        assert_eq!(texts[2], "   yesterday's note");
        assert_eq!(texts[3], "");
        assert!(texts[4].contains(" Today "));
        assert_eq!(texts[5], " You  08:30");
    }

    #[test]
    fn test_sender_label_uses_profile() {
        let mut profiles = HashMap::new();
        profiles.insert(
            "bob".to_string(),
            UserProfile {
                id: "bob".to_string(),
                email: "bob@example.com".to_string(),
                display_name: Some("Bob Stone".to_string()),
                profile_image: None,
                created_at: None,
                updated_at: None,
            },
        );
        assert_eq!(sender_label("bob", "me", &profiles), "Bob Stone");
        assert_eq!(sender_label("me", "me", &profiles), "You");
    }

    #[test]
    fn test_update_ignores_stale_chat() {
        let mut state = MessagesState::default();
        state.open("c2", "Bob".to_string());
        assert!(!state.update("c1", vec![msg("bob", "old", "2024-01-01T00:00:00Z")]));
        assert!(state.loading);
        assert!(state.update("c2", vec![]));
        assert!(!state.loading);
    }

    #[test]
    fn test_scroll_anchored_to_bottom() {
        assert_eq!(scroll_start(30, 10, 0), 20);
        assert_eq!(scroll_start(30, 10, 5), 15);
        assert_eq!(scroll_start(30, 10, 100), 0);
        assert_eq!(scroll_start(5, 10, 0), 0);

        let mut state = MessagesState::default();
        state.scroll_up(3);
        state.scroll_down(5);
        assert_eq!(state.scroll_back, 0);
    }
}
