//! Async backend: bridges the TUI event loop with the chat services.
//!
//! Uses an mpsc channel pair. The TUI sends `BackendCommand` values, and a
//! background tokio task executes them and sends `BackendResponse` values back.
//! The task also owns the live subscriptions: the chat list for the whole
//! session and the message feed of the open room.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::chat::{ChatService, DirectChat};
use crate::error::ServiceResult;
use crate::models::{ChatRoom, Message, UserProfile};
use crate::profile::ProfileService;
use crate::store::Subscription;

/// Commands sent from the TUI event loop to the async backend.
#[derive(Debug, PartialEq, Eq)]
pub enum BackendCommand {
    /// Resolve participant profiles for display names.
    LoadProfiles { ids: Vec<String> },
    /// Switch the message feed to a room and mark it read.
    OpenChat { chat_id: String },
    /// Drop the message feed.
    CloseChat,
    SendMessage { chat_id: String, text: String },
    /// Users for the new-chat picker.
    LoadUsers,
    OpenDirectChat { user_id: String },
}

/// Responses from the async backend to the TUI.
pub enum BackendResponse {
    /// Chat list snapshot, already in display order.
    Chats(ServiceResult<Vec<ChatRoom>>),
    Messages {
        chat_id: String,
        result: ServiceResult<Vec<Message>>,
    },
    Profiles(HashMap<String, UserProfile>),
    /// `text` is handed back so a failed send can restore the compose box.
    MessageSent {
        text: String,
        result: ServiceResult<Message>,
    },
    Users(ServiceResult<Vec<UserProfile>>),
    DirectChatOpened(ServiceResult<DirectChat>),
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Start the backend for signed-in user `me`. Spawns a tokio task that
    /// processes commands and forwards subscription snapshots.
    pub fn start(chats: ChatService, profiles: ProfileService, me: String) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(chats, profiles, me, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Receive a response from the backend.
    ///
    /// Returns `None` only when the backend task has exited.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

/// Next item of an optional subscription; never resolves when there is none.
async fn next_or_pending<T: Send + 'static>(
    sub: &mut Option<Subscription<T>>,
) -> Option<ServiceResult<T>> {
    match sub {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

/// The open room's feed and its id.
struct RoomFeed {
    chat_id: String,
    subscription: Subscription<Vec<Message>>,
}

async fn backend_loop(
    chats: ChatService,
    profiles: ProfileService,
    me: String,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    let mut chat_list = Some(chats.watch_user_chats(&me));
    let mut room: Option<RoomFeed> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    BackendCommand::OpenChat { chat_id } => {
                        let subscription = chats.watch_messages(&chat_id);
                        room = Some(RoomFeed { chat_id: chat_id.clone(), subscription });
                        spawn_mark_read(&chats, chat_id, me.clone());
                    }
                    BackendCommand::CloseChat => room = None,
                    other => spawn_command(other, &chats, &profiles, &me, &resp_tx),
                }
            }
            snapshot = next_or_pending(&mut chat_list) => {
                match snapshot {
                    Some(result) => {
                        if resp_tx.send(BackendResponse::Chats(result)).is_err() {
                            break;
                        }
                    }
                    None => chat_list = None,
                }
            }
            snapshot = next_in_room(&mut room) => {
                let Some(feed) = room.as_ref() else { continue };
                let chat_id = feed.chat_id.clone();
                match snapshot {
                    Some(result) => {
                        if result.is_ok() {
                            // The viewer is looking at the room; keep its counter at zero.
                            spawn_mark_read(&chats, chat_id.clone(), me.clone());
                        }
                        if resp_tx.send(BackendResponse::Messages { chat_id, result }).is_err() {
                            break;
                        }
                    }
                    None => room = None,
                }
            }
        }
    }
    tracing::debug!("Backend loop finished");
}

async fn next_in_room(room: &mut Option<RoomFeed>) -> Option<ServiceResult<Vec<Message>>> {
    match room {
        Some(feed) => feed.subscription.next().await,
        None => std::future::pending().await,
    }
}

fn spawn_mark_read(chats: &ChatService, chat_id: String, me: String) {
    let chats = chats.clone();
    tokio::spawn(async move {
        if let Err(e) = chats.mark_read(&chat_id, &me).await {
            tracing::warn!(chat_id = %chat_id, "Failed to mark chat read: {}", e);
        }
    });
}

/// One-shot commands run as separate tasks so the loop keeps forwarding
/// snapshots.
fn spawn_command(
    cmd: BackendCommand,
    chats: &ChatService,
    profiles: &ProfileService,
    me: &str,
    resp_tx: &mpsc::UnboundedSender<BackendResponse>,
) {
    let chats = chats.clone();
    let profiles = profiles.clone();
    let me = me.to_string();
    let resp_tx = resp_tx.clone();

    tokio::spawn(async move {
        let response = match cmd {
            BackendCommand::LoadProfiles { ids } => {
                BackendResponse::Profiles(profiles.fetch_many(&ids).await)
            }
            BackendCommand::SendMessage { chat_id, text } => {
                let result = chats.send_message(&chat_id, &me, &text).await;
                BackendResponse::MessageSent { text, result }
            }
            BackendCommand::LoadUsers => BackendResponse::Users(profiles.list_users_except(&me).await),
            BackendCommand::OpenDirectChat { user_id } => {
                BackendResponse::DirectChatOpened(chats.open_direct_chat(&me, &user_id).await)
            }
            BackendCommand::OpenChat { .. } | BackendCommand::CloseChat => return,
        };
        let _ = resp_tx.send(response);
    });
}
