//! Authentication provider seam

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::ServiceResult;

/// The signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

/// Email/password authentication operations.
///
/// Implementations are constructed explicitly and injected; nothing reaches
/// for a global client.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<AuthUser>;

    async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<AuthUser>;

    async fn sign_out(&self) -> ServiceResult<()>;

    async fn reset_password(&self, email: &str) -> ServiceResult<()>;

    /// Delete the currently signed-in identity.
    async fn delete_account(&self) -> ServiceResult<()>;

    fn current_user(&self) -> Option<AuthUser>;

    /// Identity-change notifications. The receiver always holds the current
    /// identity (or `None`) and wakes on every change.
    fn on_auth_state_change(&self) -> watch::Receiver<Option<AuthUser>>;
}

/// Something that can hand out a fresh bearer token for backend calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn id_token(&self) -> ServiceResult<String>;
}
