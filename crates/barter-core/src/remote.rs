//! Remote store boundary.
//!
//! Defines the interface the engine consumes for authentication, profile and
//! tag operations, decoupling it from the concrete backend and its transport.

use crate::error::Result;
use crate::profile::{Profile, ProfileFields};
use crate::session::{Session, SessionChange};
use crate::tag::{ProfileTagLink, Tag, TagKind};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Backend executing queries and mutations.
///
/// # Implementation Notes
///
/// - Every call is best-effort and at-most-once; the engine never retries.
/// - Failures come back as typed errors, never as panics.
/// - Session changes are delivered in the order they happen. The engine
///   treats them as the single source of truth for session identity.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the currently persisted session, if any.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Subscribes to sign-in, sign-out and token-refresh notifications.
    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange>;

    /// Checks credentials. On success a session change follows asynchronously.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<()>;

    /// Invalidates the current session.
    async fn sign_out(&self) -> Result<()>;

    /// Loads the profile owned by `user_id` together with its tag links.
    ///
    /// - `Ok(Some(profile))`: profile found
    /// - `Ok(None)`: the user has not created a profile yet
    async fn query_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    async fn create_profile(&self, user_id: &str, fields: &ProfileFields) -> Result<Profile>;

    async fn update_profile(&self, user_id: &str, fields: &ProfileFields) -> Result<Profile>;

    /// Searches the tag catalog by name within one section.
    async fn search_tags(&self, kind: TagKind, text: &str, limit: usize) -> Result<Vec<Tag>>;

    /// Links a tag to a profile.
    ///
    /// Backends are expected to enforce at most one link per
    /// (profile, tag) pair.
    async fn insert_tag_link(&self, profile_id: &str, tag_id: &str) -> Result<ProfileTagLink>;

    /// Removes a link by its own id.
    async fn delete_tag_link(&self, link_id: &str) -> Result<()>;
}
