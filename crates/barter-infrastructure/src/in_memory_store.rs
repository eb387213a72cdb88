//! In-memory remote store.
//!
//! A complete local backend honouring the [`RemoteStore`] contract: password
//! accounts, one current session with change notifications, profiles keyed
//! by user id, a tag catalog and a link table with a uniqueness constraint
//! on (profile, tag). Used for local runs and integration tests.

use async_trait::async_trait;
use barter_core::error::{BarterError, Result};
use barter_core::profile::{Profile, ProfileFields, Visibility};
use barter_core::remote::RemoteStore;
use barter_core::session::{Principal, Session, SessionChange};
use barter_core::tag::{ProfileTagLink, Tag, TagKind, normalize_tag_name};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

const SESSION_TTL_HOURS: i64 = 1;
const CHANGE_CHANNEL_CAPACITY: usize = 64;

struct Account {
    user_id: String,
    password: String,
}

struct StoredProfile {
    id: String,
    user_id: String,
    username: Option<String>,
    display_name: Option<String>,
    bio: Option<String>,
    visibility: Visibility,
}

struct StoredLink {
    id: String,
    profile_id: String,
    tag_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct StoreState {
    /// Keyed by lowercased e-mail.
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    /// Keyed by user id.
    profiles: HashMap<String, StoredProfile>,
    tags: HashMap<String, Tag>,
    /// Insertion order is link order.
    links: Vec<StoredLink>,
    offline: bool,
}

impl StoreState {
    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(BarterError::network("remote store is unreachable"));
        }
        Ok(())
    }

    /// Returns the user id of the current session.
    fn require_session(&self) -> Result<&str> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| BarterError::auth("Session expired. Please sign in again."))?;
        if session.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(BarterError::auth("Session expired. Please sign in again."));
        }
        Ok(session.user_id())
    }

    /// Only the owner may read or write their own rows.
    fn require_owner(&self, user_id: &str) -> Result<()> {
        if self.require_session()? != user_id {
            return Err(BarterError::auth("Not allowed to access this profile"));
        }
        Ok(())
    }

    fn profile_by_id(&self, profile_id: &str) -> Option<&StoredProfile> {
        self.profiles.values().find(|p| p.id == profile_id)
    }

    fn username_taken(&self, username: &str, except_user: &str) -> bool {
        self.profiles.values().any(|p| {
            p.user_id != except_user
                && p.username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(username))
        })
    }

    fn materialize_link(&self, link: &StoredLink) -> Option<ProfileTagLink> {
        let tag = self.tags.get(&link.tag_id)?.clone();
        Some(ProfileTagLink {
            id: link.id.clone(),
            profile_id: link.profile_id.clone(),
            tag,
            created_at: Some(link.created_at),
        })
    }

    fn materialize_profile(&self, stored: &StoredProfile) -> Profile {
        let mut profile = Profile::new(stored.id.clone(), stored.user_id.clone());
        profile.username = stored.username.clone();
        profile.display_name = stored.display_name.clone();
        profile.bio = stored.bio.clone();
        profile.visibility = stored.visibility;
        profile.tags = self
            .links
            .iter()
            .filter(|l| l.profile_id == stored.id)
            .filter_map(|l| self.materialize_link(l))
            .collect();
        profile
    }

    fn apply_fields(&mut self, user_id: &str, fields: &ProfileFields) -> Result<()> {
        if let Some(username) = fields.username.as_deref()
            && self.username_taken(username, user_id)
        {
            return Err(BarterError::Conflict(format!(
                "username '{}' is already taken",
                username
            )));
        }
        let stored = self
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| BarterError::not_found("profile", user_id))?;
        if let Some(username) = &fields.username {
            stored.username = Some(username.clone());
        }
        if let Some(display_name) = &fields.display_name {
            stored.display_name = Some(display_name.clone());
        }
        if let Some(bio) = &fields.bio {
            stored.bio = Some(bio.clone());
        }
        if let Some(visibility) = fields.visibility {
            stored.visibility = visibility;
        }
        Ok(())
    }
}

/// Thread-safe in-memory implementation of [`RemoteStore`].
pub struct InMemoryRemoteStore {
    state: RwLock<StoreState>,
    changes: broadcast::Sender<SessionChange>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            changes,
        }
    }

    // ============================================================================
    // Seeding and simulation helpers
    // ============================================================================

    /// Adds a catalog tag and returns it.
    pub async fn seed_tag(&self, name: &str, kind: TagKind) -> Tag {
        let tag = Tag::new(Uuid::new_v4().to_string(), name, kind);
        self.state
            .write()
            .await
            .tags
            .insert(tag.id.clone(), tag.clone());
        tag
    }

    /// Makes every data call fail with a network error until reset.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// Ends the current session as if it expired server-side.
    pub async fn expire_session(&self) {
        let mut state = self.state.write().await;
        if state.session.take().is_some() {
            tracing::debug!("[InMemoryRemoteStore] Session expired");
            let _ = self.changes.send(None);
        }
    }

    /// Rotates the access token of the current session.
    pub async fn refresh_token(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let session = state.session.as_mut().ok_or(BarterError::NotAuthenticated)?;
        session.access_token = Uuid::new_v4().to_string();
        session.expires_at = Some(Utc::now() + Duration::hours(SESSION_TTL_HOURS));
        let _ = self.changes.send(Some(session.clone()));
        Ok(())
    }

    /// Number of links currently stored, across all profiles.
    pub async fn link_count(&self) -> usize {
        self.state.read().await.links.len()
    }

    fn start_session(&self, state: &mut StoreState, user_id: String, email: String) {
        let mut session = Session::new(
            Uuid::new_v4().to_string(),
            Principal::new(user_id).with_email(email),
        );
        session.expires_at = Some(Utc::now() + Duration::hours(SESSION_TTL_HOURS));
        state.session = Some(session.clone());
        let _ = self.changes.send(Some(session));
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get_session(&self) -> Result<Option<Session>> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state
            .session
            .clone()
            .filter(|s| s.expires_at.is_none_or(|at| at > Utc::now())))
    }

    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_online()?;
        let key = email.to_lowercase();
        let user_id = match state.accounts.get(&key) {
            Some(account) if account.password == password => account.user_id.clone(),
            _ => return Err(BarterError::auth("Invalid login credentials")),
        };
        tracing::debug!("[InMemoryRemoteStore] Signed in {}", user_id);
        self.start_session(&mut state, user_id, key);
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_online()?;
        let key = email.to_lowercase();
        if state.accounts.contains_key(&key) {
            return Err(BarterError::auth("User already registered"));
        }
        let user_id = Uuid::new_v4().to_string();
        state.accounts.insert(
            key.clone(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        tracing::debug!("[InMemoryRemoteStore] Registered {}", user_id);
        self.start_session(&mut state, user_id, key);
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_online()?;
        state.session = None;
        let _ = self.changes.send(None);
        Ok(())
    }

    async fn query_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let state = self.state.read().await;
        state.check_online()?;
        state.require_owner(user_id)?;
        Ok(state
            .profiles
            .get(user_id)
            .map(|stored| state.materialize_profile(stored)))
    }

    async fn create_profile(&self, user_id: &str, fields: &ProfileFields) -> Result<Profile> {
        let mut state = self.state.write().await;
        state.check_online()?;
        state.require_owner(user_id)?;
        if state.profiles.contains_key(user_id) {
            return Err(BarterError::Conflict(format!(
                "profile for {} already exists",
                user_id
            )));
        }
        if let Some(username) = fields.username.as_deref()
            && state.username_taken(username, user_id)
        {
            return Err(BarterError::Conflict(format!(
                "username '{}' is already taken",
                username
            )));
        }

        state.profiles.insert(
            user_id.to_string(),
            StoredProfile {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                username: None,
                display_name: None,
                bio: None,
                visibility: Visibility::default(),
            },
        );
        state.apply_fields(user_id, fields)?;
        let stored = state
            .profiles
            .get(user_id)
            .ok_or_else(|| BarterError::internal("profile vanished after insert"))?;
        Ok(state.materialize_profile(stored))
    }

    async fn update_profile(&self, user_id: &str, fields: &ProfileFields) -> Result<Profile> {
        let mut state = self.state.write().await;
        state.check_online()?;
        state.require_owner(user_id)?;
        state.apply_fields(user_id, fields)?;
        let stored = state
            .profiles
            .get(user_id)
            .ok_or_else(|| BarterError::not_found("profile", user_id))?;
        Ok(state.materialize_profile(stored))
    }

    async fn search_tags(&self, kind: TagKind, text: &str, limit: usize) -> Result<Vec<Tag>> {
        let state = self.state.read().await;
        state.check_online()?;
        let needle = normalize_tag_name(text);
        let mut matches: Vec<Tag> = state
            .tags
            .values()
            .filter(|t| t.kind == kind && t.normalized_name.contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.normalized_name.cmp(&b.normalized_name))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn insert_tag_link(&self, profile_id: &str, tag_id: &str) -> Result<ProfileTagLink> {
        let mut state = self.state.write().await;
        state.check_online()?;
        let owner = state
            .profile_by_id(profile_id)
            .map(|p| p.user_id.clone())
            .ok_or_else(|| BarterError::not_found("profile", profile_id))?;
        state.require_owner(&owner)?;
        if !state.tags.contains_key(tag_id) {
            return Err(BarterError::not_found("tag", tag_id));
        }
        if state
            .links
            .iter()
            .any(|l| l.profile_id == profile_id && l.tag_id == tag_id)
        {
            return Err(BarterError::Conflict(format!(
                "tag {} is already linked to profile {}",
                tag_id, profile_id
            )));
        }

        let link = StoredLink {
            id: Uuid::new_v4().to_string(),
            profile_id: profile_id.to_string(),
            tag_id: tag_id.to_string(),
            created_at: Utc::now(),
        };
        if let Some(tag) = state.tags.get_mut(tag_id) {
            tag.usage_count += 1;
        }
        let materialized = state
            .materialize_link(&link)
            .ok_or_else(|| BarterError::not_found("tag", tag_id))?;
        state.links.push(link);
        Ok(materialized)
    }

    async fn delete_tag_link(&self, link_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_online()?;
        let Some(index) = state.links.iter().position(|l| l.id == link_id) else {
            // Deleting an absent row is not an error.
            return Ok(());
        };
        let owner = state
            .profile_by_id(&state.links[index].profile_id)
            .map(|p| p.user_id.clone())
            .ok_or_else(|| BarterError::internal("link without profile"))?;
        state.require_owner(&owner)?;

        let removed = state.links.remove(index);
        if let Some(tag) = state.tags.get_mut(&removed.tag_id) {
            tag.usage_count = tag.usage_count.saturating_sub(1);
        }
        Ok(())
    }
}
