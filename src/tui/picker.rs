//! New-chat overlay: Ctrl+N opens a user list to start a direct chat with.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

use crate::chat::display::filter_users;
use crate::models::UserProfile;

// ---------------------------------------------------------------------------
// Picker state
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PickerState {
    /// Whether the overlay is visible.
    pub active: bool,
    /// Filter typed by the user.
    pub query: String,
    /// Every other user, sorted by name.
    pub users: Vec<UserProfile>,
    /// Waiting for the user list.
    pub loading: bool,
    /// Waiting for the direct chat to open.
    pub opening: bool,
    /// Index into the filtered list.
    pub selected: usize,
}

impl PickerState {
    /// Show the overlay. The user list is reloaded every time.
    pub fn activate(&mut self) {
        *self = Self {
            active: true,
            loading: true,
            ..Self::default()
        };
    }

    pub fn deactivate(&mut self) {
        *self = Self::default();
    }

    pub fn set_users(&mut self, users: Vec<UserProfile>) {
        self.users = users;
        self.loading = false;
        self.selected = 0;
    }

    /// Users matching the query.
    pub fn matches(&self) -> Vec<&UserProfile> {
        filter_users(&self.users, &self.query)
    }

    pub fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.selected = 0;
    }

    pub fn backspace(&mut self) {
        self.query.pop();
        self.selected = 0;
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.matches().len() {
            self.selected += 1;
        }
    }

    /// The highlighted user's id, unless a chat is already being opened.
    pub fn choose(&mut self) -> Option<String> {
        if self.opening {
            return None;
        }
        let uid = self.matches().get(self.selected).map(|u| u.id.clone())?;
        self.opening = true;
        Some(uid)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

const MAX_VISIBLE_RESULTS: usize = 12;

/// Render the picker centered over the main content. Drawn on top using Clear.
pub fn render_picker_overlay(frame: &mut Frame, state: &PickerState) {
    if !state.active {
        return;
    }

    let area = frame.area();
    let width = area.width.saturating_sub(4).min(60);
    let height = (MAX_VISIBLE_RESULTS as u16 + 4).min(area.height.saturating_sub(2));
    if width < 10 || height < 4 {
        return;
    }
    let overlay = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + 1,
        width,
        height,
    );
    frame.render_widget(Clear, overlay);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(Span::styled(
            " New Chat (Esc to close) ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    if inner.height < 2 {
        return;
    }

    // Query line.
    let query_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let query_line = if state.query.is_empty() {
        Line::from(Span::styled(
            " Search by name or email...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::styled(
            format!(" {}", state.query),
            Style::default().fg(Color::White),
        ))
    };
    Paragraph::new(query_line).render(query_area, frame.buffer_mut());
    let cursor_x = inner.x + 1 + unicode_width::UnicodeWidthStr::width(state.query.as_str()) as u16;
    frame.set_cursor_position((cursor_x.min(inner.x + inner.width.saturating_sub(1)), inner.y));

    let list_area = Rect::new(inner.x, inner.y + 1, inner.width, inner.height - 1);
    render_results(list_area, frame.buffer_mut(), state);
}

fn render_results(area: Rect, buf: &mut Buffer, state: &PickerState) {
    let hint = |text: &str, buf: &mut Buffer| {
        let line = Line::from(Span::styled(text.to_string(), Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(area.x, area.y, area.width, 1), buf);
    };

    if state.loading {
        hint(" Loading users...", buf);
        return;
    }
    if state.opening {
        hint(" Opening chat...", buf);
        return;
    }
    let matches = state.matches();
    if matches.is_empty() {
        hint(" No users found", buf);
        return;
    }

    let visible = (area.height as usize).max(1);
    let offset = state.selected.saturating_sub(visible - 1);
    for (row, idx) in (offset..matches.len()).take(visible).enumerate() {
        let user = matches[idx];
        let selected = idx == state.selected;
        let row_area = Rect::new(area.x, area.y + row as u16, area.width, 1);
        render_user_row(row_area, buf, user, selected);
    }
}

fn render_user_row(area: Rect, buf: &mut Buffer, user: &UserProfile, selected: bool) {
    let bg = if selected {
        Style::default().bg(Color::DarkGray)
    } else {
        Style::default()
    };
    let name_style = bg.fg(Color::White).add_modifier(Modifier::BOLD);
    let email_style = bg.fg(Color::Gray);

    let cursor = if selected { "\u{25BA}" } else { " " };
    let line = Line::from(vec![
        Span::styled(format!("{}({}) ", cursor, user.initial()), bg.fg(Color::Cyan)),
        Span::styled(user.label().to_string(), name_style),
        Span::styled(format!("  {}", user.email), email_style),
    ]);
    Paragraph::new(line).style(bg).render(area, buf);
}
