//! Configuration and credential storage

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{StoredSession, TokenStore};
use crate::chat::UnreadPolicy;

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_message_limit() -> usize {
    crate::chat::DEFAULT_MESSAGE_LIMIT
}

/// Chat behaviour knobs (`[chat]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// How often live queries re-check the backend.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Messages shown per room.
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    #[serde(default)]
    pub unread_policy: UnreadPolicy,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            message_limit: default_message_limit(),
            unread_policy: UnreadPolicy::default(),
        }
    }
}

impl ChatSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(250))
    }
}

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Web API key of the backend project
    pub api_key: Option<String>,
    /// Backend project id (document database lives under it)
    pub project_id: Option<String>,
    /// Signed-in session (tokens)
    pub session: Option<StoredSession>,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "firechat", "firechat")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory for the TUI log file
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "firechat", "firechat")
            .context("Could not determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Replace the stored session and write the file.
    pub fn store_session(session: Option<StoredSession>) -> Result<()> {
        let mut config = Self::load()?;
        match session {
            Some(session) => config.set_session(session),
            None => config.clear_session(),
        }
        config.save()
    }

    /// Project keys, or an error pointing at `firechat init`.
    pub fn project(&self) -> Result<(&str, &str)> {
        match (self.api_key.as_deref(), self.project_id.as_deref()) {
            (Some(key), Some(project)) if !key.is_empty() && !project.is_empty() => {
                Ok((key, project))
            }
            _ => bail!("Backend project not configured. Run 'firechat init' first."),
        }
    }
}

impl TokenStore for Config {
    fn get_session(&self) -> Option<StoredSession> {
        self.session.clone()
    }

    fn set_session(&mut self, session: StoredSession) {
        self.session = Some(session);
    }

    fn clear_session(&mut self) {
        self.session = None;
    }
}
