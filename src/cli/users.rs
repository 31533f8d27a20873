//! User directory and profile commands

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::Local;

use super::user_error;
use crate::chat::display;
use crate::profile::{image, ProfileDraft};
use crate::session::Session;

/// List other users, optionally filtered by name or email.
pub async fn list_users(query: Option<String>) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;
    let users = session
        .profiles
        .list_users_except(&me.uid)
        .await
        .map_err(user_error)?;
    let shown = display::filter_users(&users, query.as_deref().unwrap_or(""));

    println!("\nUsers:");
    println!("{:-<60}", "");
    if shown.is_empty() {
        println!("  (no users found)");
        return Ok(());
    }
    for user in shown {
        println!("[{}] {}", user.initial(), user.label());
        println!("  Email: {}", user.email);
        println!("  ID: {}", user.id);
    }
    Ok(())
}

/// Requested profile edits.
#[derive(Debug, Default)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub image: Option<PathBuf>,
    pub remove_image: bool,
}

impl ProfileEdit {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.image.is_none() && !self.remove_image
    }
}

/// Show the signed-in user's profile, or apply edits to it.
pub async fn profile(edit: ProfileEdit) -> Result<()> {
    let session = Session::from_disk()?;
    let me = session.user()?;
    let current = session
        .profiles
        .get_profile(&me.uid)
        .await
        .map_err(user_error)?;

    if edit.is_empty() {
        println!("Name:    {}", current.display_name.as_deref().unwrap_or("(not set)"));
        println!("Email:   {}", current.email);
        println!("ID:      {}", current.id);
        match current.profile_image.as_deref().and_then(image::describe) {
            Some((mime, size)) => println!("Image:   {} ({} bytes)", mime, size),
            None => println!("Image:   none"),
        }
        if let Some(updated) = current.updated_at {
            println!("Updated: {}", updated.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
        }
        return Ok(());
    }

    let mut draft = ProfileDraft::from_profile(&current);
    if let Some(name) = edit.name {
        draft.display_name = name;
    }
    if edit.remove_image {
        draft.profile_image = None;
    } else if let Some(path) = edit.image {
        draft.profile_image = Some(image::load_data_uri(&path).await.map_err(user_error)?);
    }

    let update = match draft.changes() {
        Ok(update) => update,
        Err(e) => {
            println!("{}", e.user_message());
            return Ok(());
        }
    };
    if let Err(e) = session.profiles.update_profile(&me.uid, &update).await {
        tracing::debug!("Profile update failed: {}", e);
        bail!("Failed to update profile");
    }
    println!("Profile updated successfully.");
    Ok(())
}
