//! Email/password identity REST binding.
//!
//! Sign-in and sign-up return an ID token (one hour) and a refresh token. The
//! ID token is the bearer credential for the document store; it is refreshed
//! through the secure-token endpoint when it is about to expire.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;

use super::{AuthError, AuthProvider, AuthUser, StoredSession, StoredToken, TokenSource};
use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::store::client::RestClient;

const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

/// The secure-token endpoint answers in snake_case.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

fn parse_expiry(expires_in: Option<&str>) -> Option<u64> {
    expires_in.and_then(|s| s.parse().ok())
}

/// Turn 4xx identity responses into `AuthError`s so the code table applies.
fn auth_error(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Backend {
            status, message, ..
        } if (400..500).contains(&status) => AuthError::from_native(message).into(),
        other => other,
    }
}

/// Identity client holding the current session.
pub struct IdentityClient {
    http: RestClient,
    api_key: String,
    session: RwLock<Option<StoredSession>>,
    state_tx: watch::Sender<Option<AuthUser>>,
    /// Write session changes back to the config file.
    persist: bool,
}

impl IdentityClient {
    pub fn new(api_key: impl Into<String>, session: Option<StoredSession>, persist: bool) -> Self {
        let user = session.as_ref().map(|s| AuthUser {
            uid: s.uid.clone(),
            email: s.email.clone(),
        });
        let (state_tx, _) = watch::channel(user);
        Self {
            http: RestClient::new(),
            api_key: api_key.into(),
            session: RwLock::new(session),
            state_tx,
            persist,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", IDENTITY_BASE, method, self.api_key)
    }

    fn session(&self) -> Option<StoredSession> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn replace_session(&self, session: Option<StoredSession>) {
        let user = session.as_ref().map(|s| AuthUser {
            uid: s.uid.clone(),
            email: s.email.clone(),
        });

        if self.persist {
            if let Err(e) = Config::store_session(session.clone()) {
                tracing::warn!("Failed to persist session: {:#}", e);
            }
        }

        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
        self.state_tx.send_replace(user);
    }

    async fn password_call(&self, method: &str, email: &str, password: &str) -> ServiceResult<AuthUser> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let resp = self
            .http
            .post_json(&self.endpoint(method), &body)
            .await
            .map_err(auth_error)?;
        let signed_in: SignInResponse = resp.json().await?;

        let session = StoredSession {
            uid: signed_in.local_id,
            email: signed_in.email.unwrap_or_else(|| email.to_string()),
            id_token: StoredToken::new(
                signed_in.id_token,
                parse_expiry(signed_in.expires_in.as_deref()),
            ),
            refresh_token: signed_in.refresh_token,
        };
        let user = AuthUser {
            uid: session.uid.clone(),
            email: session.email.clone(),
        };
        self.replace_session(Some(session));
        Ok(user)
    }

    /// Exchange the refresh token for a new ID token.
    async fn refresh(&self, current: StoredSession) -> ServiceResult<String> {
        tracing::info!("ID token expired, refreshing...");
        let url = format!("{}?key={}", SECURE_TOKEN_URL, self.api_key);
        let resp = self
            .http
            .post_form(
                &url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", current.refresh_token.as_str()),
                ],
            )
            .await
            .map_err(auth_error)?;
        let refreshed: RefreshResponse = resp.json().await?;

        let token = refreshed.id_token.clone();
        self.replace_session(Some(StoredSession {
            id_token: StoredToken::new(
                refreshed.id_token,
                parse_expiry(refreshed.expires_in.as_deref()),
            ),
            refresh_token: refreshed.refresh_token,
            ..current
        }));
        tracing::info!("ID token refreshed");
        Ok(token)
    }
}

#[async_trait]
impl AuthProvider for IdentityClient {
    async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<AuthUser> {
        self.password_call("signInWithPassword", email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<AuthUser> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_out(&self) -> ServiceResult<()> {
        // Tokens are bearer credentials; signing out is forgetting them.
        self.replace_session(None);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> ServiceResult<()> {
        let body = serde_json::json!({
            "requestType": "PASSWORD_RESET",
            "email": email,
        });
        self.http
            .post_json(&self.endpoint("sendOobCode"), &body)
            .await
            .map_err(auth_error)?;
        Ok(())
    }

    async fn delete_account(&self) -> ServiceResult<()> {
        let token = self.id_token().await?;
        let body = serde_json::json!({ "idToken": token });
        self.http
            .post_json(&self.endpoint("delete"), &body)
            .await
            .map_err(auth_error)?;
        self.replace_session(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.state_tx.borrow().clone()
    }

    fn on_auth_state_change(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state_tx.subscribe()
    }
}

#[async_trait]
impl TokenSource for IdentityClient {
    async fn id_token(&self) -> ServiceResult<String> {
        let session = self.session().ok_or(ServiceError::NotSignedIn)?;
        if !session.id_token.is_expired() {
            return Ok(session.id_token.token);
        }
        self.refresh(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> StoredSession {
        StoredSession {
            uid: "u1".to_string(),
            email: "a@example.com".to_string(),
            id_token: StoredToken::new("tok".to_string(), Some(3600)),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn test_current_user_from_stored_session() {
        let client = IdentityClient::new("key", Some(session()), false);
        let user = client.current_user().unwrap();
        assert_eq!(user.uid, "u1");
        assert_eq!(user.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_refresh() {
        let client = IdentityClient::new("key", Some(session()), false);
        assert_eq!(client.id_token().await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn test_sign_out_notifies_listeners() {
        let client = IdentityClient::new("key", Some(session()), false);
        let mut rx = client.on_auth_state_change();
        assert!(rx.borrow().is_some());

        client.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(matches!(
            client.id_token().await,
            Err(ServiceError::NotSignedIn)
        ));
    }

    #[test]
    fn test_identity_4xx_maps_to_auth_error() {
        let err = auth_error(ServiceError::Backend {
            status: 400,
            code: "EMAIL_EXISTS".to_string(),
            message: "EMAIL_EXISTS".to_string(),
        });
        assert_eq!(err.code(), "auth/email-already-in-use");

        let err = auth_error(ServiceError::Backend {
            status: 503,
            code: "UNAVAILABLE".to_string(),
            message: "try later".to_string(),
        });
        assert_eq!(err.code(), "UNAVAILABLE");
    }
}
