//! User profiles
//!
//! Profile documents live in `users/{uid}` and are only ever written by the
//! identity they belong to.

pub mod image;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chat::USERS;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{decode_all, Record, UserProfile};
use crate::store::{DocumentStore, Fields, Query};

/// Fields written by a profile save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: String,
    /// `Some` only when the image changed; `Some(None)` removes it.
    pub profile_image: Option<Option<String>>,
}

/// Editable copy of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub display_name: String,
    pub profile_image: Option<String>,
    initial_name: String,
    initial_image: Option<String>,
}

impl ProfileDraft {
    pub fn from_profile(profile: &UserProfile) -> Self {
        let name = profile.display_name.clone().unwrap_or_default();
        Self {
            display_name: name.clone(),
            profile_image: profile.profile_image.clone(),
            initial_name: name,
            initial_image: profile.profile_image.clone(),
        }
    }

    pub fn name_changed(&self) -> bool {
        self.display_name.trim() != self.initial_name.trim()
    }

    pub fn image_changed(&self) -> bool {
        self.profile_image != self.initial_image
    }

    /// The update to send, or a validation error when nothing changed.
    pub fn changes(&self) -> ServiceResult<ProfileUpdate> {
        if !self.name_changed() && !self.image_changed() {
            return Err(ServiceError::validation("No changes to save"));
        }
        Ok(ProfileUpdate {
            display_name: self.display_name.trim().to_string(),
            profile_image: self
                .image_changed()
                .then(|| self.profile_image.clone()),
        })
    }

    /// Adopt the saved values as the new baseline.
    pub fn commit(&mut self) {
        self.display_name = self.display_name.trim().to_string();
        self.initial_name = self.display_name.clone();
        self.initial_image = self.profile_image.clone();
    }
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Write the profile document for a freshly created identity.
    pub async fn create_profile(
        &self,
        uid: &str,
        email: &str,
        display_name: &str,
    ) -> ServiceResult<UserProfile> {
        let now = Utc::now();
        let profile = UserProfile {
            id: uid.to_string(),
            email: email.trim().to_string(),
            display_name: Some(display_name.trim().to_string()).filter(|n| !n.is_empty()),
            profile_image: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.store.set(USERS, uid, profile.to_fields()?).await?;
        info!(user_id = uid, "Profile created");
        Ok(profile)
    }

    pub async fn get_profile(&self, uid: &str) -> ServiceResult<UserProfile> {
        let doc = self
            .store
            .get(USERS, uid)
            .await?
            .ok_or_else(|| ServiceError::not_found("profile", uid))?;
        UserProfile::from_document(doc)
    }

    /// Apply an update and stamp `updatedAt`. Fails if the profile is missing.
    pub async fn update_profile(&self, uid: &str, update: &ProfileUpdate) -> ServiceResult<()> {
        let mut fields = Fields::new();
        fields.insert("displayName".into(), Value::from(update.display_name.as_str()));
        if let Some(image) = &update.profile_image {
            fields.insert(
                "profileImage".into(),
                image.as_deref().map(Value::from).unwrap_or(Value::Null),
            );
        }
        fields.insert(
            "updatedAt".into(),
            Value::from(Utc::now().timestamp_millis()),
        );
        self.store.update(USERS, uid, fields).await?;
        info!(user_id = uid, "Profile updated");
        Ok(())
    }

    pub async fn delete_profile(&self, uid: &str) -> ServiceResult<()> {
        self.store.delete(USERS, uid).await?;
        info!(user_id = uid, "Profile deleted");
        Ok(())
    }

    /// Everyone but `uid`, sorted by display label.
    pub async fn list_users_except(&self, uid: &str) -> ServiceResult<Vec<UserProfile>> {
        let docs = self.store.query(&Query::collection(USERS)).await?;
        let mut users: Vec<UserProfile> = decode_all::<UserProfile>(docs)
            .into_iter()
            .filter(|u| u.id != uid)
            .collect();
        users.sort_by_key(|u| u.label().to_lowercase());
        Ok(users)
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<UserProfile>> {
        let query = Query::collection(USERS)
            .where_eq("email", email.trim())
            .limit(1);
        let docs = self.store.query(&query).await?;
        Ok(decode_all(docs).into_iter().next())
    }

    /// Resolve several uids at once. Missing or unreadable profiles are left
    /// out of the map.
    pub async fn fetch_many(&self, uids: &[String]) -> HashMap<String, UserProfile> {
        let lookups = uids.iter().map(|uid| async move { (uid, self.get_profile(uid).await) });
        let mut profiles = HashMap::new();
        for (uid, result) in join_all(lookups).await {
            match result {
                Ok(profile) => {
                    profiles.insert(uid.clone(), profile);
                }
                Err(ServiceError::NotFound { .. }) => {
                    debug!(user_id = %uid, "No profile for participant");
                }
                Err(e) => warn!(user_id = %uid, "Failed to load profile: {}", e),
            }
        }
        profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn service() -> (MemoryStore, ProfileService) {
        let store = MemoryStore::new();
        (store.clone(), ProfileService::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (_, svc) = service();
        svc.create_profile("u1", " ada@example.com ", "Ada Lovelace")
            .await
            .unwrap();
        let profile = svc.get_profile("u1").await.unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.display_name.as_deref(), Some("Ada Lovelace"));
        assert!(profile.created_at.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_profile_fails() {
        let (_, svc) = service();
        let update = ProfileUpdate {
            display_name: "x".to_string(),
            profile_image: None,
        };
        let err = svc.update_profile("ghost", &update).await.unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[tokio::test]
    async fn test_update_keeps_image_unless_changed() {
        let (_, svc) = service();
        svc.create_profile("u1", "a@example.com", "Ada").await.unwrap();
        svc.update_profile(
            "u1",
            &ProfileUpdate {
                display_name: "Ada".to_string(),
                profile_image: Some(Some("data:image/png;base64,AA==".to_string())),
            },
        )
        .await
        .unwrap();
        svc.update_profile(
            "u1",
            &ProfileUpdate {
                display_name: "Ada L".to_string(),
                profile_image: None,
            },
        )
        .await
        .unwrap();

        let profile = svc.get_profile("u1").await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ada L"));
        assert!(profile.profile_image.is_some());
        assert!(profile.updated_at >= profile.created_at);
    }

    #[test]
    fn test_draft_change_detection() {
        let profile = UserProfile {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            display_name: Some("Ada".to_string()),
            profile_image: None,
            created_at: None,
            updated_at: None,
        };
        let mut draft = ProfileDraft::from_profile(&profile);
        draft.display_name = "  Ada ".to_string();
        assert_eq!(draft.changes().unwrap_err().user_message(), "No changes to save");

        draft.display_name = "Ada L ".to_string();
        let update = draft.changes().unwrap();
        assert_eq!(update.display_name, "Ada L");
        assert_eq!(update.profile_image, None);

        draft.commit();
        assert!(draft.changes().is_err());

        draft.profile_image = Some("data:image/gif;base64,R0lG".to_string());
        assert_eq!(
            draft.changes().unwrap().profile_image,
            Some(Some("data:image/gif;base64,R0lG".to_string()))
        );
    }

    #[tokio::test]
    async fn test_list_find_and_fetch_many() {
        let (_, svc) = service();
        svc.create_profile("u1", "zed@example.com", "Zed").await.unwrap();
        svc.create_profile("u2", "amy@example.com", "Amy").await.unwrap();
        svc.create_profile("u3", "bob@example.com", "").await.unwrap();

        let others = svc.list_users_except("u1").await.unwrap();
        let labels: Vec<&str> = others.iter().map(|u| u.label()).collect();
        assert_eq!(labels, vec!["Amy", "bob@example.com"]);

        let found = svc.find_by_email("amy@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u2".to_string()));
        assert!(svc.find_by_email("nobody@example.com").await.unwrap().is_none());

        let ids = vec!["u2".to_string(), "ghost".to_string(), "u3".to_string()];
        let profiles = svc.fetch_many(&ids).await;
        assert_eq!(profiles.len(), 2);
        assert!(profiles.contains_key("u3"));
        assert!(!profiles.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_delete_profile() {
        let (store, svc) = service();
        svc.create_profile("u1", "a@example.com", "Ada").await.unwrap();
        svc.delete_profile("u1").await.unwrap();
        assert!(store.documents(USERS).is_empty());
    }
}
