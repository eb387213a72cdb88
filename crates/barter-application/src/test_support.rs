//! Scripted remote store shared by the unit tests.
//!
//! Every call is counted by operation name. Tests can hold a call until
//! released (`gate`) to force out-of-order completion, hold a profile read
//! after it has seen the stored row (`hold_after_read`), or make the next
//! call of an operation fail (`fail_next`).

use async_trait::async_trait;
use barter_core::error::{BarterError, Result};
use barter_core::profile::{Profile, ProfileFields};
use barter_core::remote::RemoteStore;
use barter_core::session::{Principal, Session, SessionChange};
use barter_core::tag::{ProfileTagLink, Tag, TagKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::{broadcast, oneshot};

pub fn principal_session(user_id: &str) -> Session {
    Session::new(
        format!("token-{}", user_id),
        Principal::new(user_id).with_email(format!("{}@example.com", user_id)),
    )
}

pub fn profile_for(user_id: &str) -> Profile {
    Profile::new(format!("profile-{}", user_id), user_id)
}

pub fn link(id: &str, profile_id: &str, tag: Tag) -> ProfileTagLink {
    ProfileTagLink {
        id: id.to_string(),
        profile_id: profile_id.to_string(),
        tag,
        created_at: None,
    }
}

pub struct ScriptedRemoteStore {
    session: Mutex<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
    profiles: Mutex<HashMap<String, Profile>>,
    catalog: Mutex<Vec<Tag>>,
    calls: Mutex<HashMap<String, usize>>,
    searched: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, VecDeque<oneshot::Receiver<()>>>>,
    read_holds: Mutex<HashMap<String, VecDeque<oneshot::Receiver<()>>>>,
    failures: Mutex<HashMap<String, BarterError>>,
    next_link: Mutex<u64>,
}

impl ScriptedRemoteStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(None),
            changes,
            profiles: Mutex::new(HashMap::new()),
            catalog: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            searched: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            read_holds: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            next_link: Mutex::new(0),
        }
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = session;
    }

    pub fn notify(&self, change: SessionChange) {
        let _ = self.changes.send(change);
    }

    pub fn put_profile(&self, profile: Profile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.user_id.clone(), profile);
    }

    pub fn add_tags(&self, tags: impl IntoIterator<Item = Tag>) {
        self.catalog.lock().unwrap().extend(tags);
    }

    /// Holds the next call matching `key` until the returned sender fires.
    ///
    /// Keys are `<operation>:<argument>`, e.g. `query_profile:u1`.
    pub fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    /// Lets the next `query_profile` for `user_id` read the stored profile,
    /// then holds its response until the returned sender fires.
    pub fn hold_after_read(&self, user_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.read_holds
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    pub fn fail_next(&self, operation: &str, error: BarterError) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), error);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn searched_texts(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }

    async fn enter(&self, operation: &str, argument: &str) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default() += 1;

        let gate = self
            .gates
            .lock()
            .unwrap()
            .get_mut(&format!("{}:{}", operation, argument))
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        match self.failures.lock().unwrap().remove(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemoteStore {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.enter("get_session", "").await?;
        Ok(self.session.lock().unwrap().clone())
    }

    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<()> {
        self.enter("sign_in_with_password", email).await
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<()> {
        self.enter("sign_up", email).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter("sign_out", "").await?;
        self.set_session(None);
        self.notify(None);
        Ok(())
    }

    async fn query_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.enter("query_profile", user_id).await?;
        let read = self.profiles.lock().unwrap().get(user_id).cloned();
        let hold = self
            .read_holds
            .lock()
            .unwrap()
            .get_mut(user_id)
            .and_then(VecDeque::pop_front);
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        Ok(read)
    }

    async fn create_profile(&self, user_id: &str, fields: &ProfileFields) -> Result<Profile> {
        self.enter("create_profile", user_id).await?;
        let mut profile = profile_for(user_id);
        apply_fields(&mut profile, fields);
        self.put_profile(profile.clone());
        Ok(profile)
    }

    async fn update_profile(&self, user_id: &str, fields: &ProfileFields) -> Result<Profile> {
        self.enter("update_profile", user_id).await?;
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| BarterError::not_found("profile", user_id))?;
        apply_fields(profile, fields);
        Ok(profile.clone())
    }

    async fn search_tags(&self, kind: TagKind, text: &str, limit: usize) -> Result<Vec<Tag>> {
        self.searched.lock().unwrap().push(text.to_string());
        self.enter("search_tags", text).await?;
        let needle = text.to_lowercase();
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.kind == kind && t.normalized_name.contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_tag_link(&self, profile_id: &str, tag_id: &str) -> Result<ProfileTagLink> {
        self.enter("insert_tag_link", tag_id).await?;
        let tag = self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == tag_id)
            .cloned()
            .ok_or_else(|| BarterError::not_found("tag", tag_id))?;
        let mut next = self.next_link.lock().unwrap();
        *next += 1;
        Ok(link(&format!("link-{}", *next), profile_id, tag))
    }

    async fn delete_tag_link(&self, link_id: &str) -> Result<()> {
        self.enter("delete_tag_link", link_id).await
    }
}

fn apply_fields(profile: &mut Profile, fields: &ProfileFields) {
    if let Some(username) = &fields.username {
        profile.username = Some(username.clone());
    }
    if let Some(display_name) = &fields.display_name {
        profile.display_name = Some(display_name.clone());
    }
    if let Some(bio) = &fields.bio {
        profile.bio = Some(bio.clone());
    }
    if let Some(visibility) = fields.visibility {
        profile.visibility = visibility;
    }
}
