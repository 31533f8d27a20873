//! TUI Application state and main event loop

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{FutureExt, StreamExt};
use ratatui::DefaultTerminal;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::ComposeState;
use super::messages::MessagesState;
use super::picker::PickerState;
use super::sidebar::SidebarState;
use super::ui;
use crate::error::ServiceError;
use crate::session::Session;

/// Redraw interval for time labels while idle.
const TICK_MS: u64 = 1000;

/// Lines moved by PageUp/PageDown in the messages pane.
const PAGE_LINES: usize = 10;

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "chats",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }

    fn previous(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Compose,
            Pane::Messages => Pane::Sidebar,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// Application state
pub struct App {
    pub should_exit: bool,
    /// Signed-in user's display name.
    pub user_name: String,
    pub active_pane: Pane,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub picker: PickerState,
    /// One-shot message shown in the status bar until the next key press.
    pub status_message: Option<String>,
    pub status_is_error: bool,
    /// Profile ids already requested, so each is fetched once.
    requested_profiles: HashSet<String>,
    /// Header for a direct chat opened from the picker before it is listed.
    pending_header: Option<String>,
}

impl App {
    pub fn new(me: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            should_exit: false,
            user_name: user_name.into(),
            active_pane: Pane::default(),
            sidebar: SidebarState::new(me),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            picker: PickerState::default(),
            status_message: None,
            status_is_error: false,
            requested_profiles: HashSet::new(),
            pending_header: None,
        }
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = false;
    }

    fn set_error(&mut self, err: &ServiceError) {
        tracing::warn!(code = err.code(), "{}", err);
        self.status_message = Some(err.user_message());
        self.status_is_error = true;
    }

    /// Profiles not yet requested among `ids`, as a load command.
    fn load_profiles(&mut self, ids: impl IntoIterator<Item = String>) -> Option<BackendCommand> {
        let me = &self.sidebar.me;
        let known = &self.sidebar.profiles;
        let requested = &mut self.requested_profiles;
        let ids: Vec<String> = ids
            .into_iter()
            .filter(|id| id != me && !known.contains_key(id) && requested.insert(id.clone()))
            .collect();
        (!ids.is_empty()).then_some(BackendCommand::LoadProfiles { ids })
    }

    fn refresh_header(&mut self) {
        let Some(chat_id) = self.messages.chat_id.clone() else {
            return;
        };
        if let Some(chat) = self.sidebar.find(&chat_id) {
            self.messages.header = self.sidebar.display_name(chat);
            self.pending_header = None;
        } else if let Some(name) = &self.pending_header {
            self.messages.header = name.clone();
        }
    }

    /// Open a chat in the messages pane and move focus to the compose box.
    fn open_chat(&mut self, chat_id: &str) -> Vec<BackendCommand> {
        if self.messages.chat_id.as_deref() == Some(chat_id) {
            self.active_pane = Pane::Compose;
            return Vec::new();
        }
        let header = match self.sidebar.find(chat_id) {
            Some(chat) => self.sidebar.display_name(chat),
            None => self.pending_header.clone().unwrap_or_default(),
        };
        self.messages.open(chat_id, header);
        self.compose.clear();
        self.active_pane = Pane::Compose;

        let mut cmds = vec![BackendCommand::OpenChat {
            chat_id: chat_id.to_string(),
        }];
        let participants: Vec<String> = self
            .sidebar
            .find(chat_id)
            .map(|c| c.participants.clone())
            .unwrap_or_default();
        cmds.extend(self.load_profiles(participants));
        cmds
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Handle a key press. Returns the backend commands it triggers.
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        self.status_message = None;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return Vec::new();
        }
        if self.picker.active {
            return self.handle_picker_key(key);
        }
        if self.sidebar.filtering {
            self.handle_filter_key(key);
            return Vec::new();
        }
        if ctrl && key.code == KeyCode::Char('n') {
            self.picker.activate();
            return vec![BackendCommand::LoadUsers];
        }

        match key.code {
            KeyCode::Tab => {
                self.active_pane = self.active_pane.next();
                return Vec::new();
            }
            KeyCode::BackTab => {
                self.active_pane = self.active_pane.previous();
                return Vec::new();
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Sidebar => self.handle_sidebar_key(key),
            Pane::Messages => {
                self.handle_messages_key(key);
                Vec::new()
            }
            Pane::Compose => self.handle_compose_key(key),
        }
    }

    fn handle_picker_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        match key.code {
            KeyCode::Esc => self.picker.deactivate(),
            KeyCode::Up => self.picker.select_previous(),
            KeyCode::Down => self.picker.select_next(),
            KeyCode::Backspace => self.picker.backspace(),
            KeyCode::Enter => {
                let label = self
                    .picker
                    .matches()
                    .get(self.picker.selected)
                    .map(|u| u.label().to_string());
                if let Some(user_id) = self.picker.choose() {
                    self.pending_header = label;
                    return vec![BackendCommand::OpenDirectChat { user_id }];
                }
            }
            KeyCode::Char(c) => self.picker.push_char(c),
            _ => {}
        }
        Vec::new()
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.sidebar.end_filter(true),
            KeyCode::Enter => self.sidebar.end_filter(false),
            KeyCode::Backspace => self.sidebar.filter_pop(),
            KeyCode::Up => self.sidebar.move_up(),
            KeyCode::Down => self.sidebar.move_down(),
            KeyCode::Char(c) => self.sidebar.filter_push(c),
            _ => {}
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.sidebar.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.sidebar.move_down(),
            KeyCode::Char('/') => self.sidebar.start_filter(),
            KeyCode::Esc if !self.sidebar.filter.is_empty() => self.sidebar.end_filter(true),
            KeyCode::Enter => {
                if let Some(chat_id) = self.sidebar.selected_chat().map(|c| c.id.clone()) {
                    return self.open_chat(&chat_id);
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_messages_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.messages.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.messages.scroll_down(PAGE_LINES),
            KeyCode::End | KeyCode::Char('G') => self.messages.follow(),
            KeyCode::Esc => self.active_pane = Pane::Sidebar,
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.active_pane = Pane::Sidebar,
            KeyCode::Enter => {
                let Some(chat_id) = self.messages.chat_id.clone() else {
                    self.set_status("Select a chat first");
                    return Vec::new();
                };
                if let Some(text) = self.compose.send() {
                    self.messages.follow();
                    return vec![BackendCommand::SendMessage { chat_id, text }];
                }
            }
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Char(c) if !ctrl => self.compose.insert_char(c),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            _ => {}
        }
        Vec::new()
    }

    // -----------------------------------------------------------------------
    // Backend responses
    // -----------------------------------------------------------------------

    /// Apply a backend response. Returns follow-up commands.
    pub fn handle_response(&mut self, resp: BackendResponse) -> Vec<BackendCommand> {
        let mut cmds = Vec::new();
        match resp {
            BackendResponse::Chats(Ok(chats)) => {
                let missing = self.sidebar.update_chats(chats);
                cmds.extend(self.load_profiles(missing));
                self.refresh_header();
            }
            BackendResponse::Chats(Err(e)) => {
                self.sidebar.loading = false;
                self.set_error(&e);
            }
            BackendResponse::Messages { chat_id, result } => match result {
                Ok(messages) => {
                    let senders: Vec<String> = messages.iter().map(|m| m.sender_id.clone()).collect();
                    if self.messages.update(&chat_id, messages) {
                        cmds.extend(self.load_profiles(senders));
                    }
                }
                Err(e) => {
                    self.messages.loading = false;
                    self.set_error(&e);
                }
            },
            BackendResponse::Profiles(profiles) => {
                self.sidebar.update_profiles(profiles);
                self.refresh_header();
            }
            BackendResponse::MessageSent { text, result } => match result {
                Ok(_) => self.compose.finish_send(None),
                Err(e) => {
                    self.compose.finish_send(Some(text));
                    self.set_error(&e);
                }
            },
            BackendResponse::Users(Ok(users)) => {
                if self.picker.active {
                    self.picker.set_users(users);
                }
            }
            BackendResponse::Users(Err(e)) => {
                self.picker.deactivate();
                self.set_error(&e);
            }
            BackendResponse::DirectChatOpened(Ok(direct)) => {
                self.picker.deactivate();
                self.sidebar.select_id(&direct.chat_id);
                cmds.extend(self.open_chat(&direct.chat_id));
                if direct.created {
                    self.set_status("Started a new chat");
                }
            }
            BackendResponse::DirectChatOpened(Err(e)) => {
                self.picker.opening = false;
                self.pending_header = None;
                self.set_error(&e);
            }
        }
        cmds
    }
}

/// Run the TUI for the signed-in user with panic-safe terminal restore.
pub async fn run(session: Session) -> Result<()> {
    let user = session.user()?;
    let user_name = match session.profiles.get_profile(&user.uid).await {
        Ok(profile) => profile.label().to_string(),
        Err(e) => {
            tracing::warn!("Could not load own profile: {}", e);
            user.email.clone()
        }
    };

    let backend = Backend::start(session.chats.clone(), session.profiles.clone(), user.uid.clone());
    let app = App::new(user.uid, user_name);

    let mut terminal = ratatui::init();
    let result = AssertUnwindSafe(run_app(&mut terminal, app, backend))
        .catch_unwind()
        .await;
    ratatui::restore();

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app(terminal: &mut DefaultTerminal, mut app: App, mut backend: Backend) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(TICK_MS));

    while !app.should_exit {
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    for cmd in app.handle_key(key) {
                        backend.send(cmd);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            resp = backend.recv() => match resp {
                Some(resp) => {
                    for cmd in app.handle_response(resp) {
                        backend.send(cmd);
                    }
                }
                None => {
                    tracing::error!("Backend task exited");
                    break;
                }
            },
            _ = tick.tick() => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::DirectChat;
    use crate::models::{ChatRoom, Message, UserProfile};
    use std::collections::HashMap;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn room(id: &str, other: &str) -> ChatRoom {
        let mut chat = ChatRoom::new(vec!["me".to_string(), other.to_string()], None);
        chat.id = id.to_string();
        chat
    }

    fn profile(uid: &str, name: &str) -> UserProfile {
        UserProfile {
            id: uid.to_string(),
            email: format!("{}@x.io", uid),
            display_name: Some(name.to_string()),
            profile_image: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn app_with_chats() -> App {
        let mut app = App::new("me", "Me");
        app.handle_response(BackendResponse::Chats(Ok(vec![room("c1", "bob"), room("c2", "amy")])));
        app
    }

    #[test]
    fn test_chat_snapshot_requests_profiles_once() {
        let mut app = App::new("me", "Me");
        let cmds = app.handle_response(BackendResponse::Chats(Ok(vec![room("c1", "bob")])));
        assert_eq!(
            cmds,
            vec![BackendCommand::LoadProfiles {
                ids: vec!["bob".to_string()]
            }]
        );
        let cmds = app.handle_response(BackendResponse::Chats(Ok(vec![room("c1", "bob")])));
        assert!(cmds.is_empty());
    }

    #[test]
    fn test_enter_opens_selected_chat() {
        let mut app = app_with_chats();
        app.handle_key(key(KeyCode::Down));
        let cmds = app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            cmds,
            vec![BackendCommand::OpenChat {
                chat_id: "c2".to_string()
            }]
        );
        assert_eq!(app.messages.chat_id.as_deref(), Some("c2"));
        assert_eq!(app.active_pane, Pane::Compose);
        assert!(app.messages.loading);
    }

    #[test]
    fn test_profiles_update_header() {
        let mut app = app_with_chats();
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.messages.header, "Unknown User");

        let profiles: HashMap<String, UserProfile> =
            [("bob".to_string(), profile("bob", "Bob"))].into_iter().collect();
        app.handle_response(BackendResponse::Profiles(profiles));
        assert_eq!(app.messages.header, "Bob");
    }

    #[test]
    fn test_send_and_failure_restores_text() {
        let mut app = app_with_chats();
        app.handle_key(key(KeyCode::Enter));
        for c in "hi".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        let cmds = app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            cmds,
            vec![BackendCommand::SendMessage {
                chat_id: "c1".to_string(),
                text: "hi".to_string()
            }]
        );
        assert!(app.compose.input.is_empty());

        app.handle_response(BackendResponse::MessageSent {
            text: "hi".to_string(),
            result: Err(ServiceError::validation("You are not a participant in this chat")),
        });
        assert_eq!(app.compose.input, "hi");
        assert!(app.status_is_error);
        assert_eq!(
            app.status_message.as_deref(),
            Some("You are not a participant in this chat")
        );
    }

    #[test]
    fn test_enter_without_chat_does_not_send() {
        let mut app = App::new("me", "Me");
        app.active_pane = Pane::Compose;
        app.handle_key(key(KeyCode::Char('x')));
        assert!(app.handle_key(key(KeyCode::Enter)).is_empty());
        assert_eq!(app.compose.input, "x");
    }

    #[test]
    fn test_q_types_in_compose_but_quits_elsewhere() {
        let mut app = app_with_chats();
        app.active_pane = Pane::Compose;
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_exit);
        assert_eq!(app.compose.input, "q");

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.active_pane, Pane::Sidebar);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_exit);
    }

    #[test]
    fn test_picker_flow() {
        let mut app = app_with_chats();
        let cmds = app.handle_key(ctrl('n'));
        assert_eq!(cmds, vec![BackendCommand::LoadUsers]);
        assert!(app.picker.active);

        app.handle_response(BackendResponse::Users(Ok(vec![profile("zed", "Zed")])));
        let cmds = app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            cmds,
            vec![BackendCommand::OpenDirectChat {
                user_id: "zed".to_string()
            }]
        );

        let cmds = app.handle_response(BackendResponse::DirectChatOpened(Ok(DirectChat {
            chat_id: "c9".to_string(),
            created: true,
        })));
        assert!(!app.picker.active);
        assert_eq!(app.messages.chat_id.as_deref(), Some("c9"));
        assert_eq!(app.messages.header, "Zed");
        assert_eq!(app.status_message.as_deref(), Some("Started a new chat"));
        assert_eq!(
            cmds,
            vec![BackendCommand::OpenChat {
                chat_id: "c9".to_string()
            }]
        );
    }

    #[test]
    fn test_filter_mode_captures_keys() {
        let mut app = app_with_chats();
        app.handle_key(key(KeyCode::Char('/')));
        assert!(app.sidebar.filtering);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_exit);
        assert_eq!(app.sidebar.filter, "q");
        app.handle_key(key(KeyCode::Esc));
        assert!(!app.sidebar.filtering);
        assert!(app.sidebar.filter.is_empty());
    }

    #[test]
    fn test_stale_message_snapshot_ignored() {
        let mut app = app_with_chats();
        app.handle_key(key(KeyCode::Enter));
        let cmds = app.handle_response(BackendResponse::Messages {
            chat_id: "other".to_string(),
            result: Ok(vec![Message::new("other", "eve", "hi")]),
        });
        assert!(cmds.is_empty());
        assert!(app.messages.messages.is_empty());

        let cmds = app.handle_response(BackendResponse::Messages {
            chat_id: "c1".to_string(),
            result: Ok(vec![Message::new("c1", "carl", "hey")]),
        });
        assert_eq!(app.messages.messages.len(), 1);
        assert_eq!(
            cmds,
            vec![BackendCommand::LoadProfiles {
                ids: vec!["carl".to_string()]
            }]
        );
    }

    #[test]
    fn test_ctrl_c_always_exits() {
        let mut app = app_with_chats();
        app.handle_key(ctrl('n'));
        app.handle_key(ctrl('c'));
        assert!(app.should_exit);
    }
}
