//! Tag attach/detach workflow.
//!
//! Local effects go through the coordinator, which stays the single writer
//! of profile state. Attach is confirmed before it becomes visible; detach
//! is optimistic and rolls back to the exact prior link on failure.

use crate::session::{SessionProfileCoordinator, WeakCoordinator};
use barter_core::error::{BarterError, Result};
use barter_core::remote::RemoteStore;
use barter_core::tag::{ProfileTagLink, Tag, TagKind};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

type SharedAttach = Shared<BoxFuture<'static, Result<ProfileTagLink>>>;

pub struct TagAssociationManager {
    store: Arc<dyn RemoteStore>,
    coordinator: WeakCoordinator,
    /// Inserts in flight, keyed by profile id and tag id.
    attaching: Mutex<HashMap<(String, String), SharedAttach>>,
}

impl TagAssociationManager {
    pub fn new(store: Arc<dyn RemoteStore>, coordinator: WeakCoordinator) -> Self {
        Self {
            store,
            coordinator,
            attaching: Mutex::new(HashMap::new()),
        }
    }

    fn coordinator(&self) -> Result<SessionProfileCoordinator> {
        self.coordinator
            .upgrade()
            .ok_or_else(|| BarterError::internal("session coordinator has been dropped"))
    }

    /// Attaches `tag` under the `section` it was picked from, creating the
    /// profile first if the user has none yet.
    pub async fn attach_tag(&self, section: TagKind, tag: &Tag) -> Result<ProfileTagLink> {
        if tag.kind != section {
            return Err(BarterError::validation(
                "tag",
                format!("'{}' does not belong to the {} section", tag.name, section),
            ));
        }
        let profile = self.coordinator()?.ensure_profile().await?;
        self.attach(&profile.id, tag).await
    }

    /// Links `tag` to the profile.
    ///
    /// If the tag is already linked, the existing link is returned and no
    /// remote insert happens. A second attach of a tag whose insert is still
    /// in flight waits for that insert; other tags are not held up. On
    /// failure nothing is added locally.
    pub async fn attach(&self, profile_id: &str, tag: &Tag) -> Result<ProfileTagLink> {
        let coordinator = self.coordinator()?;
        let profile = coordinator
            .snapshot()
            .profile
            .filter(|p| p.id == profile_id)
            .ok_or_else(|| BarterError::not_found("profile", profile_id))?;
        if let Some(existing) = profile.link_for_tag(&tag.id) {
            tracing::debug!("[Tags] '{}' already linked as {}", tag.name, existing.id);
            return Ok(existing.clone());
        }

        let key = (profile_id.to_string(), tag.id.clone());
        let pending = self
            .attaching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_insert_with(|| {
                insert_and_apply(
                    Arc::clone(&self.store),
                    coordinator,
                    profile_id.to_string(),
                    tag.clone(),
                )
                .boxed()
                .shared()
            })
            .clone();

        let result = pending.clone().await;

        let mut attaching = self.attaching.lock().unwrap_or_else(PoisonError::into_inner);
        if attaching
            .get(&key)
            .is_some_and(|current| current.ptr_eq(&pending))
        {
            attaching.remove(&key);
        }
        result
    }

    pub async fn detach_tag(&self, link: &ProfileTagLink) -> Result<()> {
        self.detach(&link.id).await
    }

    /// Removes a link by id.
    ///
    /// The link disappears locally at call time. If the remote delete fails
    /// it is put back at its former position and the error is returned.
    /// Detaching a link that is no longer visible is a no-op.
    pub async fn detach(&self, link_id: &str) -> Result<()> {
        let coordinator = self.coordinator()?;
        let Some(profile_id) = coordinator.snapshot().profile.map(|p| p.id) else {
            return Ok(());
        };
        let Some(pending) = coordinator.remove_link(&profile_id, link_id).await else {
            tracing::debug!("[Tags] Link {} already removed", link_id);
            return Ok(());
        };

        let result = self.store.delete_tag_link(link_id).await;
        if let Err(e) = &result {
            tracing::warn!("[Tags] Detaching {} failed, restoring: {}", link_id, e);
            if !coordinator.restore_link(&pending).await {
                tracing::debug!("[Tags] Rollback of {} skipped, profile changed", link_id);
            }
        }
        coordinator.finish_detach(pending).await;
        result
    }
}

async fn insert_and_apply(
    store: Arc<dyn RemoteStore>,
    coordinator: SessionProfileCoordinator,
    profile_id: String,
    tag: Tag,
) -> Result<ProfileTagLink> {
    let link = match store.insert_tag_link(&profile_id, &tag.id).await {
        Ok(link) => link,
        Err(BarterError::Conflict(message)) => {
            return reconcile_conflict(&coordinator, &tag, message).await;
        }
        Err(e) => {
            tracing::warn!("[Tags] Attaching '{}' failed: {}", tag.name, e);
            return Err(e);
        }
    };

    match coordinator.insert_link(link.clone()).await {
        Some(visible) => Ok(visible),
        None => {
            tracing::debug!("[Tags] Profile changed before link {} was applied", link.id);
            Ok(link)
        }
    }
}

/// The store already holds a link for this tag (another client won the
/// race). Reload and hand back the server's link.
async fn reconcile_conflict(
    coordinator: &SessionProfileCoordinator,
    tag: &Tag,
    message: String,
) -> Result<ProfileTagLink> {
    tracing::info!("[Tags] Link conflict for '{}', reloading profile", tag.name);
    let reloaded = coordinator.refresh_profile().await?;
    reloaded
        .as_ref()
        .and_then(|p| p.link_for_tag(&tag.id))
        .cloned()
        .ok_or(BarterError::Conflict(message))
}
