//! Account flows: login, sign-up, password reset and deletion
//!
//! Each flow validates its form first, so a rejected form never reaches the
//! provider.

use std::sync::Arc;

use tracing::{info, warn};

use super::validation::{summarize, LoginForm, ResetPasswordForm, SignupForm};
use super::{AuthProvider, AuthUser};
use crate::error::{ServiceError, ServiceResult};
use crate::profile::ProfileService;

/// Text for a failed sign-up. Auth errors use the sign-up column of the
/// code table.
pub fn sign_up_message(err: &ServiceError) -> String {
    match err {
        ServiceError::Auth(e) => e.sign_up_message().to_string(),
        other => other.user_message(),
    }
}

#[derive(Clone)]
pub struct AccountService {
    auth: Arc<dyn AuthProvider>,
    profiles: ProfileService,
}

impl AccountService {
    pub fn new(auth: Arc<dyn AuthProvider>, profiles: ProfileService) -> Self {
        Self { auth, profiles }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user()
    }

    pub async fn login(&self, form: &LoginForm) -> ServiceResult<AuthUser> {
        form.check()
            .map_err(|errs| ServiceError::validation(summarize(&errs)))?;
        let user = self.auth.sign_in(form.email.trim(), &form.password).await?;
        info!(user_id = %user.uid, "Signed in");
        Ok(user)
    }

    /// Create the identity and its profile document, then sign out so the
    /// user logs in explicitly.
    pub async fn signup(&self, form: &SignupForm) -> ServiceResult<AuthUser> {
        form.check()
            .map_err(|errs| ServiceError::validation(summarize(&errs)))?;
        let email = form.email.trim();
        let user = self.auth.sign_up(email, &form.password).await?;
        info!(user_id = %user.uid, "Account created");

        let created = self
            .profiles
            .create_profile(&user.uid, email, &form.display_name())
            .await;
        if let Err(e) = self.auth.sign_out().await {
            warn!("Sign-out after sign-up failed: {}", e);
        }
        created?;
        Ok(user)
    }

    pub async fn logout(&self) -> ServiceResult<()> {
        self.auth.sign_out().await?;
        info!("Signed out");
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> ServiceResult<()> {
        let form = ResetPasswordForm {
            email: email.trim().to_string(),
        };
        form.check()
            .map_err(|errs| ServiceError::validation(summarize(&errs)))?;
        self.auth.reset_password(&form.email).await?;
        info!("Password reset email requested");
        Ok(())
    }

    /// Remove the profile document, then the identity itself.
    pub async fn delete_account(&self) -> ServiceResult<()> {
        let user = self.auth.current_user().ok_or(ServiceError::NotSignedIn)?;
        self.profiles.delete_profile(&user.uid).await?;
        self.auth.delete_account().await?;
        info!(user_id = %user.uid, "Account deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory auth provider for tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::watch;

    use crate::auth::{AuthError, AuthProvider, AuthUser};
    use crate::error::ServiceResult;

    pub struct FakeAuth {
        /// email -> (uid, password)
        accounts: Mutex<HashMap<String, (String, String)>>,
        state: watch::Sender<Option<AuthUser>>,
        pub resets: Mutex<Vec<String>>,
    }

    impl FakeAuth {
        pub fn new() -> Self {
            let (state, _) = watch::channel(None);
            Self {
                accounts: Mutex::new(HashMap::new()),
                state,
                resets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AuthProvider for FakeAuth {
        async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<AuthUser> {
            let accounts = self.accounts.lock().unwrap();
            let (uid, stored) = accounts
                .get(email)
                .ok_or_else(|| AuthError::from_native("EMAIL_NOT_FOUND"))?;
            if stored != password {
                return Err(AuthError::from_native("INVALID_PASSWORD").into());
            }
            let user = AuthUser {
                uid: uid.clone(),
                email: email.to_string(),
            };
            self.state.send_replace(Some(user.clone()));
            Ok(user)
        }

        async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<AuthUser> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(AuthError::from_native("EMAIL_EXISTS").into());
            }
            let uid = format!("uid{}", accounts.len() + 1);
            accounts.insert(email.to_string(), (uid.clone(), password.to_string()));
            let user = AuthUser {
                uid,
                email: email.to_string(),
            };
            self.state.send_replace(Some(user.clone()));
            Ok(user)
        }

        async fn sign_out(&self) -> ServiceResult<()> {
            self.state.send_replace(None);
            Ok(())
        }

        async fn reset_password(&self, email: &str) -> ServiceResult<()> {
            self.resets.lock().unwrap().push(email.to_string());
            Ok(())
        }

        async fn delete_account(&self) -> ServiceResult<()> {
            if let Some(user) = self.state.borrow().clone() {
                self.accounts.lock().unwrap().remove(&user.email);
            }
            self.state.send_replace(None);
            Ok(())
        }

        fn current_user(&self) -> Option<AuthUser> {
            self.state.borrow().clone()
        }

        fn on_auth_state_change(&self) -> watch::Receiver<Option<AuthUser>> {
            self.state.subscribe()
        }
    }
}
