//! Sidebar widget: the user's chat rooms, most recent first.

use std::collections::HashMap;

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::chat::display::{chat_display_name, chat_time_label, filter_chats, preview, profile_ids_for};
use crate::chat::unread::unread_for;
use crate::models::{ChatRoom, UserProfile};

/// Rendered rows per chat: name line + preview line.
const ROWS_PER_CHAT: usize = 2;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// Sidebar state: owns the chat list and tracks navigation.
pub struct SidebarState {
    /// Signed-in user id.
    pub me: String,
    /// Chats in display order, as delivered by the live query.
    pub chats: Vec<ChatRoom>,
    /// Profiles of direct-chat partners, by uid.
    pub profiles: HashMap<String, UserProfile>,
    /// Index into the filtered list.
    pub selected: usize,
    /// Whether the first snapshot is still pending.
    pub loading: bool,
    /// Case-insensitive filter over names and last messages.
    pub filter: String,
    /// Whether keystrokes currently go to the filter.
    pub filtering: bool,
}

impl SidebarState {
    pub fn new(me: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            chats: Vec::new(),
            profiles: HashMap::new(),
            selected: 0,
            loading: true,
            filter: String::new(),
            filtering: false,
        }
    }

    /// Replace the chat list, keeping the selected chat selected when it
    /// is still listed. Returns participant ids with no loaded profile.
    pub fn update_chats(&mut self, chats: Vec<ChatRoom>) -> Vec<String> {
        let previous = self.selected_chat().map(|c| c.id.clone());
        self.chats = chats;
        self.loading = false;

        if let Some(id) = previous {
            let position = self.visible().iter().position(|c| c.id == id);
            if let Some(idx) = position {
                self.selected = idx;
            }
        }
        self.clamp_selection();

        profile_ids_for(&self.chats, &self.me)
            .into_iter()
            .filter(|uid| !self.profiles.contains_key(uid))
            .collect()
    }

    pub fn update_profiles(&mut self, profiles: HashMap<String, UserProfile>) {
        self.profiles.extend(profiles);
    }

    pub fn display_name(&self, chat: &ChatRoom) -> String {
        chat_display_name(chat, &self.me, &self.profiles)
    }

    /// Chats that pass the current filter, in display order.
    pub fn visible(&self) -> Vec<&ChatRoom> {
        filter_chats(&self.chats, &self.filter, |c| self.display_name(c))
    }

    pub fn selected_chat(&self) -> Option<&ChatRoom> {
        self.visible().get(self.selected).copied()
    }

    pub fn find(&self, chat_id: &str) -> Option<&ChatRoom> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    /// Select a chat by id, clearing a filter that hides it.
    pub fn select_id(&mut self, chat_id: &str) {
        if !self.visible().iter().any(|c| c.id == chat_id) {
            self.filter.clear();
        }
        let position = self.visible().iter().position(|c| c.id == chat_id);
        if let Some(idx) = position {
            self.selected = idx;
        }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.visible().len() {
            self.selected += 1;
        }
    }

    pub fn start_filter(&mut self) {
        self.filtering = true;
    }

    pub fn filter_push(&mut self, c: char) {
        self.filter.push(c);
        self.selected = 0;
    }

    pub fn filter_pop(&mut self) {
        self.filter.pop();
        self.selected = 0;
    }

    /// Leave filter input; `clear` also drops the filter text.
    pub fn end_filter(&mut self, clear: bool) {
        self.filtering = false;
        if clear {
            self.filter.clear();
            self.selected = 0;
        }
    }

    /// Clamp selected index to valid range after structural changes.
    pub fn clamp_selection(&mut self) {
        let count = self.visible().len();
        if count == 0 {
            self.selected = 0;
        } else if self.selected >= count {
            self.selected = count - 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the sidebar into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &SidebarState, focused: bool) {
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
        .border_style(border_style)
        .title(" Chats ");

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    // Filter line takes the first row while active or non-empty.
    let mut list_area = inner;
    if state.filtering || !state.filter.is_empty() {
        let filter_area = Rect::new(inner.x, inner.y, inner.width, 1);
        let style = if state.filtering {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" /{}", state.filter), style)))
            .render(filter_area, buf);
        list_area = Rect::new(inner.x, inner.y + 1, inner.width, inner.height.saturating_sub(1));
    }

    if state.loading {
        render_hint(list_area, buf, " Loading...");
        return;
    }

    let chats = state.visible();
    if chats.is_empty() {
        let hint = if state.chats.is_empty() {
            " No chats yet. Ctrl+N to start one."
        } else {
            " No chats match."
        };
        render_hint(list_area, buf, hint);
        return;
    }

    let capacity = (list_area.height as usize / ROWS_PER_CHAT).max(1);
    let scroll_offset = compute_scroll_offset(state.selected, capacity, chats.len());
    let now = Local::now();

    for (slot, idx) in (scroll_offset..chats.len()).take(capacity).enumerate() {
        let y = list_area.y + (slot * ROWS_PER_CHAT) as u16;
        if y >= list_area.y + list_area.height {
            break;
        }
        let chat = chats[idx];
        let selected = idx == state.selected;
        let unread = unread_for(chat, &state.me);

        let cursor = if selected { "\u{25BA}" } else { " " };
        let icon = if chat.is_group { "+" } else { "*" };
        let name = format!("{}{} {}", cursor, icon, state.display_name(chat));
        let time = chat_time_label(chat.last_message_time, &now);

        let style = item_style(selected, unread > 0);
        render_row(buf, Rect::new(list_area.x, y, list_area.width, 1), &name, &time, style, style);

        if y + 1 < list_area.y + list_area.height {
            let width = list_area.width as usize;
            let body = format!("   {}", preview(chat.last_message.as_deref(), width.saturating_sub(8)));
            let badge = if unread > 0 { unread.to_string() } else { String::new() };
            let body_style = if selected {
                Style::default().fg(Color::Gray).bg(Color::DarkGray)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            render_row(
                buf,
                Rect::new(list_area.x, y + 1, list_area.width, 1),
                &body,
                &badge,
                body_style,
                badge_style(selected),
            );
        }
    }
}

fn render_hint(area: Rect, buf: &mut Buffer, text: &str) {
    if area.height == 0 {
        return;
    }
    let line = Line::from(Span::styled(text.to_string(), Style::default().fg(Color::DarkGray)));
    Paragraph::new(line).render(Rect::new(area.x, area.y, area.width, 1), buf);
}

/// Simple scroll offset: keep selected item visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    let max_offset = total.saturating_sub(height);
    selected.saturating_sub(height - 1).min(max_offset)
}

/// Style for a chat row based on selection and unread state.
fn item_style(selected: bool, has_unread: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if has_unread {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn badge_style(selected: bool) -> Style {
    let style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    if selected {
        style.bg(Color::DarkGray)
    } else {
        style
    }
}

/// Render a row with left-aligned text and an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_w = UnicodeWidthStr::width(badge);
    let max_left = if badge_w > 0 {
        width.saturating_sub(badge_w + 1)
    } else {
        width
    };

    let mut left_truncated = String::new();
    let mut left_w = 0;
    for c in left.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if left_w + cw > max_left {
            break;
        }
        left_truncated.push(c);
        left_w += cw;
    }

    let pad = width.saturating_sub(left_w + badge_w);
    let line = Line::from(vec![
        Span::styled(left_truncated, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);
    Paragraph::new(line).render(area, buf);
}
