//! Account commands: init, login, signup, logout, status, password reset and
//! account deletion.

use anyhow::{bail, Result};

use super::{prompt, user_error};
use crate::auth::account::sign_up_message;
use crate::auth::validation::{LoginForm, SignupForm};
use crate::auth::{AuthProvider, TokenStore};
use crate::config::Config;
use crate::session::Session;

/// Store the backend project keys.
pub fn init(api_key: &str, project_id: &str) -> Result<()> {
    let (api_key, project_id) = (api_key.trim(), project_id.trim());
    if api_key.is_empty() || project_id.is_empty() {
        bail!("API key and project id must not be empty");
    }
    let mut config = Config::load()?;
    if config.api_key.as_deref() != Some(api_key) || config.project_id.as_deref() != Some(project_id) {
        // A session belongs to one project.
        config.clear_session();
    }
    config.api_key = Some(api_key.to_string());
    config.project_id = Some(project_id.to_string());
    config.save()?;
    println!("Configuration saved to {}", Config::config_path()?.display());
    Ok(())
}

pub async fn login(email: Option<String>, password: Option<String>) -> Result<()> {
    let session = Session::from_disk()?;
    if let Some(user) = session.auth.current_user() {
        println!("Already logged in as {}. Run 'firechat logout' first.", user.email);
        return Ok(());
    }

    let email = match email {
        Some(e) => e,
        None => prompt::line("Email: ")?,
    };
    let password = match password {
        Some(p) => p,
        None => prompt::password("Password: ")?,
    };

    let form = LoginForm { email, password };
    match session.accounts.login(&form).await {
        Ok(user) => {
            println!("Login successful.");
            println!("Signed in as {} ({})", user.email, user.uid);
            Ok(())
        }
        Err(e) => Err(user_error(e)),
    }
}

pub async fn signup(first_name: Option<String>, last_name: Option<String>, email: Option<String>) -> Result<()> {
    let session = Session::from_disk()?;

    let first_name = match first_name {
        Some(v) => v,
        None => prompt::line("First name: ")?,
    };
    let last_name = match last_name {
        Some(v) => v,
        None => prompt::line("Last name: ")?,
    };
    let email = match email {
        Some(v) => v,
        None => prompt::line("Email: ")?,
    };
    let password = prompt::password("Password: ")?;
    let confirm_password = prompt::password("Confirm password: ")?;

    let form = SignupForm {
        first_name,
        last_name,
        email,
        password,
        confirm_password,
    };
    match session.accounts.signup(&form).await {
        Ok(user) => {
            println!("Account created for {}.", user.email);
            println!("Run 'firechat login' to sign in.");
            Ok(())
        }
        Err(e) => {
            tracing::debug!("Sign-up failed: {}", e);
            bail!("{}", sign_up_message(&e))
        }
    }
}

pub async fn logout() -> Result<()> {
    let session = Session::from_disk()?;
    session.accounts.logout().await.map_err(user_error)?;
    println!("Logged out.");
    Ok(())
}

pub async fn status() -> Result<()> {
    let config = Config::load()?;
    println!("Config:      {}", Config::config_path()?.display());
    match config.project() {
        Ok((_, project)) => println!("Project:     {}", project),
        Err(_) => {
            println!("Project:     not configured (run 'firechat init')");
            return Ok(());
        }
    }

    match config.get_session() {
        Some(session) => {
            println!("User:        {} ({})", session.email, session.uid);
            if session.id_token.is_expired() {
                println!("ID token:    expired (will refresh)");
            } else {
                println!("ID token:    valid");
            }
            if let Some(exp) = session.id_token.expires_at {
                println!("  expires_at: {}", exp);
            }
        }
        None => println!("User:        not logged in"),
    }
    println!("Unread:      {:?}", config.chat.unread_policy);
    Ok(())
}

pub async fn reset_password(email: Option<String>) -> Result<()> {
    let session = Session::from_disk()?;
    let email = match email {
        Some(e) => e,
        None => prompt::line("Email: ")?,
    };
    session
        .accounts
        .reset_password(&email)
        .await
        .map_err(user_error)?;
    println!("Password reset email sent to {}.", email.trim());
    Ok(())
}

pub async fn delete_account(yes: bool) -> Result<()> {
    let session = Session::from_disk()?;
    let user = session.user()?;
    if !yes && !prompt::confirm(&format!("Permanently delete account {}?", user.email))? {
        println!("Aborted.");
        return Ok(());
    }
    session.accounts.delete_account().await.map_err(user_error)?;
    println!("Account deleted.");
    Ok(())
}
