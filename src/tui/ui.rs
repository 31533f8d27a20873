//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, Pane};
use super::compose;
use super::messages;
use super::picker;
use super::sidebar;
use crate::chat::unread::total_unread;

/// Width of the chat list column.
const SIDEBAR_WIDTH: u16 = 34;

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: header (1 line) + main content + status bar (1 line)
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)]).areas(main_area);

    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        app.active_pane == Pane::Sidebar,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        &app.sidebar.me,
        &app.sidebar.profiles,
        app.active_pane == Pane::Messages,
    );

    let chat_name = if app.messages.chat_id.is_some() {
        app.messages.header.as_str()
    } else {
        ""
    };
    compose::render(
        compose_area,
        frame,
        &app.compose,
        chat_name,
        app.active_pane == Pane::Compose && !app.picker.active,
    );

    render_status(status_area, frame.buffer_mut(), app);

    // Overlay goes last so it sits on top of everything else.
    if app.picker.active {
        picker::render_picker_overlay(frame, &app.picker);
    }
}

/// Render the header bar
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " Firechat";
    let unread = total_unread(&app.sidebar.chats, &app.sidebar.me);
    let unread_text = if unread > 0 {
        format!(" {} unread ", unread)
    } else {
        String::new()
    };
    let user_text = format!(" {} ", app.user_name);

    let used = title.width() + unread_text.width() + user_text.width();
    let padding = (area.width as usize).saturating_sub(used);

    let header_line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(
            unread_text,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(user_text, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    // A pending status message replaces the key hints.
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", msg), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::Gray);
    let hint_style = Style::default().fg(Color::Gray);

    let chat_display = match app.messages.chat_id {
        Some(_) => app.messages.header.clone(),
        None => "(no chat)".to_string(),
    };

    let status_line = Line::from(vec![
        Span::styled(format!(" {}", chat_display), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", sep_style),
        Span::styled(
            format!("Tab: {}", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(" | ", sep_style),
        Span::styled("C-n: new chat", hint_style),
        Span::styled(" | ", sep_style),
        Span::styled("/: filter", hint_style),
        Span::styled(" | ", sep_style),
        Span::styled("q: quit", hint_style),
    ]);

    Paragraph::new(status_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
