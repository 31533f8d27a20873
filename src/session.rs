//! Wiring of config, identity, store and services

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::auth::{AccountService, AuthProvider, AuthUser, IdentityClient, TokenStore};
use crate::chat::ChatService;
use crate::config::Config;
use crate::profile::ProfileService;
use crate::store::client::RestClient;
use crate::store::{DocumentStore, FirestoreStore};

/// Backend handles for one run of the program.
pub struct Session {
    pub auth: Arc<IdentityClient>,
    pub chats: ChatService,
    pub profiles: ProfileService,
    pub accounts: AccountService,
}

impl Session {
    /// Build the clients from config. Session changes are written back to
    /// the config file.
    pub fn open(config: &Config) -> Result<Self> {
        let (api_key, project_id) = config.project()?;
        let auth = Arc::new(IdentityClient::new(api_key, config.get_session(), true));

        let http = RestClient::with_tokens(auth.clone());
        let store: Arc<dyn DocumentStore> = Arc::new(FirestoreStore::new(
            http,
            project_id,
            config.chat.poll_interval(),
        ));

        let chats = ChatService::new(store.clone())
            .with_unread_policy(config.chat.unread_policy)
            .with_message_limit(config.chat.message_limit);
        let profiles = ProfileService::new(store);
        let accounts = AccountService::new(auth.clone(), profiles.clone());

        Ok(Self {
            auth,
            chats,
            profiles,
            accounts,
        })
    }

    /// Load config from disk and open a session.
    pub fn from_disk() -> Result<Self> {
        let config = Config::load()?;
        Self::open(&config)
    }

    /// The signed-in user, or an error telling how to sign in.
    pub fn user(&self) -> Result<AuthUser> {
        self.auth
            .current_user()
            .context("Not logged in. Run 'firechat login' first.")
    }
}
