//! Compose box: single-line message input with a character counter.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::chat::MAX_MESSAGE_CHARS;

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
    /// Set while a send is in flight; input is locked meanwhile.
    pub sending: bool,
}

impl ComposeState {
    /// Insert a character at the cursor. Input stops at the message limit.
    pub fn insert_char(&mut self, c: char) {
        if self.sending || self.char_count() >= MAX_MESSAGE_CHARS {
            return;
        }
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.sending || self.cursor_pos == 0 {
            return;
        }
        let byte_pos = self.char_to_byte(self.cursor_pos);
        let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
        self.input.drain(prev_byte_pos..byte_pos);
        self.cursor_pos -= 1;
    }

    /// Delete the character at the cursor (delete key).
    pub fn delete(&mut self) {
        if self.sending || self.cursor_pos >= self.char_count() {
            return;
        }
        let byte_pos = self.char_to_byte(self.cursor_pos);
        let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
        self.input.drain(byte_pos..next_byte_pos);
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.char_count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.char_count();
    }

    /// Clear all input text (Ctrl+U).
    pub fn clear(&mut self) {
        if self.sending {
            return;
        }
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Take the trimmed text for sending and clear the box.
    ///
    /// Returns None for whitespace-only input or while a send is in flight.
    pub fn send(&mut self) -> Option<String> {
        if self.sending {
            return None;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.input.clear();
        self.cursor_pos = 0;
        self.sending = true;
        Some(text)
    }

    /// Send finished. A failed send puts the text back so it can be retried.
    pub fn finish_send(&mut self, failed_text: Option<String>) {
        self.sending = false;
        if let Some(text) = failed_text {
            if self.input.is_empty() {
                self.cursor_pos = text.chars().count();
                self.input = text;
            }
        }
    }

    pub fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    /// Convert a char-based cursor position to a byte offset.
    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Height of the compose box: border + input line + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Render the compose box into the given area.
///
/// Uses `Frame` directly so we can both write to the buffer and set cursor.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, chat_name: &str, focused: bool) {
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

    let counter_style = if state.char_count() >= MAX_MESSAGE_CHARS {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let counter = if state.sending {
        Line::from(Span::styled(" sending... ", Style::default().fg(Color::Cyan)))
    } else {
        Line::from(Span::styled(
            format!(" {}/{} ", state.char_count(), MAX_MESSAGE_CHARS),
            counter_style,
        ))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title_bottom(counter.right_aligned());

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let display = compose_display_text(&state.input, state.cursor_pos, input_area.width as usize);
    render_input(input_area, frame.buffer_mut(), state, &display, chat_name);

    if focused {
        let cx = input_area.x + 1 + display.cursor_offset as u16;
        frame.set_cursor_position((cx, input_area.y));
    }
}

/// Render the input line (with placeholder or text).
fn render_input(area: Rect, buf: &mut Buffer, state: &ComposeState, display: &DisplayText, chat_name: &str) {
    let line = if state.input.is_empty() {
        let placeholder = if chat_name.is_empty() {
            " Select a chat to start messaging".to_string()
        } else {
            format!(" Message {}...", chat_name)
        };
        let truncated: String = placeholder.chars().take(area.width as usize).collect();
        Line::from(Span::styled(truncated, Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ))
    };
    Paragraph::new(line).render(area, buf);
}

/// What text to display and where the cursor is.
struct DisplayText {
    visible: String,
    /// Cursor offset within the visible text, in columns.
    cursor_offset: usize,
}

/// Compute the visible slice with horizontal scrolling that keeps the
/// cursor in view. Newlines are flattened to spaces.
fn compose_display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    let chars: Vec<char> = input
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    // One column is taken by the leading space.
    let avail = width.saturating_sub(2);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let cursor = cursor_pos.min(chars.len());
    let start = if cursor < avail { 0 } else { cursor - avail + 1 };
    let end = (start + avail).min(chars.len());
    let visible: String = chars[start..end].iter().collect();
    let before: String = chars[start..cursor].iter().collect();

    DisplayText {
        cursor_offset: UnicodeWidthStr::width(before.as_str()),
        visible,
    }
}
