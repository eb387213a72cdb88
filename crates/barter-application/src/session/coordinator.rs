//! Session/profile lifecycle coordinator.
//!
//! The coordinator is the single writer of session and profile state. It
//! reacts to session-change notifications from the remote store, loads the
//! profile for the current principal and recomputes completeness after every
//! mutation. Every asynchronous resumption re-validates the context it was
//! started for (session epoch, load id, profile id) before touching state.

use super::snapshot::{ProfileSnapshot, SessionPhase};
use barter_core::error::{BarterError, Result};
use barter_core::profile::{Profile, ProfileCompletionEvaluator, ProfileFields};
use barter_core::remote::RemoteStore;
use barter_core::session::{Credentials, Session, SessionChange};
use barter_core::tag::ProfileTagLink;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

type SharedLoad = Shared<BoxFuture<'static, Result<Option<Profile>>>>;
type SharedCreate = Shared<BoxFuture<'static, Result<Profile>>>;

struct InFlightLoad {
    load_id: u64,
    epoch: u64,
    user_id: String,
    future: SharedLoad,
}

struct PendingCreate {
    create_id: u64,
    epoch: u64,
    future: SharedCreate,
}

/// A link removed locally whose remote deletion is outstanding.
pub(crate) struct PendingDetach {
    profile_id: String,
    index: usize,
    link: ProfileTagLink,
    epoch: u64,
}

struct CoordinatorState {
    phase: SessionPhase,
    session: Option<Session>,
    profile: Option<Profile>,
    last_error: Option<BarterError>,
    /// Bumped whenever the session identity changes or is cleared.
    epoch: u64,
    next_load_id: u64,
    in_flight: Option<InFlightLoad>,
    next_create_id: u64,
    creating: Option<PendingCreate>,
    /// Links removed locally whose remote delete has not settled.
    detaching: HashSet<String>,
    listener: Option<JoinHandle<()>>,
}

impl CoordinatorState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            session: None,
            profile: None,
            last_error: None,
            epoch: 0,
            next_load_id: 0,
            in_flight: None,
            next_create_id: 0,
            creating: None,
            detaching: HashSet::new(),
            listener: None,
        }
    }

    fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(Session::user_id)
    }

    fn profile_id(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.id.as_str())
    }
}

struct CoordinatorInner {
    store: Arc<dyn RemoteStore>,
    evaluator: ProfileCompletionEvaluator,
    state: RwLock<CoordinatorState>,
    snapshot_tx: watch::Sender<ProfileSnapshot>,
}

/// Owns the session lifecycle and the profile derived from it.
///
/// States: `Unauthenticated`, `AuthenticatingSession`, `LoadingProfile`,
/// `Ready` and `ProfileUnavailable`. Transitions are driven by
/// [`handle_session_change`](Self::handle_session_change), which the
/// subscription installed by [`init`](Self::init) feeds.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct SessionProfileCoordinator {
    inner: Arc<CoordinatorInner>,
}

/// Non-owning handle used by components that act on the coordinator's behalf.
#[derive(Clone)]
pub struct WeakCoordinator {
    inner: Weak<CoordinatorInner>,
}

impl WeakCoordinator {
    pub fn upgrade(&self) -> Option<SessionProfileCoordinator> {
        self.inner
            .upgrade()
            .map(|inner| SessionProfileCoordinator { inner })
    }
}

impl SessionProfileCoordinator {
    /// Creates a coordinator in the `Unauthenticated` phase.
    ///
    /// Nothing happens until [`init`](Self::init) is called.
    pub fn new(store: Arc<dyn RemoteStore>, evaluator: ProfileCompletionEvaluator) -> Self {
        let initial = ProfileSnapshot {
            phase: SessionPhase::Unauthenticated,
            principal: None,
            profile: None,
            completion: evaluator.evaluate_optional(None),
            profile_loading: false,
            last_error: None,
        };
        let (snapshot_tx, _) = watch::channel(initial);

        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                evaluator,
                state: RwLock::new(CoordinatorState::new()),
                snapshot_tx,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakCoordinator {
        WeakCoordinator {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<ProfileSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    /// Subscribes to session changes and checks for an existing session.
    ///
    /// The subscription is installed before the check so no notification is
    /// missed. A notification that arrives while the check is in flight wins
    /// over the check result. A failed check ends in `Unauthenticated`.
    pub async fn init(&self) -> ProfileSnapshot {
        let changes = self.inner.store.subscribe_session_changes();

        let check_epoch = {
            let mut state = self.inner.state.write().await;
            if let Some(previous) = state.listener.take() {
                previous.abort();
            }
            state.listener = Some(self.spawn_listener(changes));
            state.phase = SessionPhase::AuthenticatingSession;
            self.publish_locked(&state);
            state.epoch
        };

        let existing = self.inner.store.get_session().await;

        let mut state = self.inner.state.write().await;
        if state.epoch != check_epoch || state.phase != SessionPhase::AuthenticatingSession {
            tracing::debug!("[Coordinator] Session check superseded by a notification");
            return self.snapshot();
        }

        match existing {
            Ok(Some(session)) => {
                tracing::info!(
                    "[Coordinator] Restored session for {}",
                    session.user_id()
                );
                self.adopt_session_locked(&mut state, session);
            }
            Ok(None) => {
                tracing::info!("[Coordinator] No existing session");
                state.phase = SessionPhase::Unauthenticated;
            }
            Err(e) => {
                tracing::warn!("[Coordinator] Session check failed: {}", e);
                state.phase = SessionPhase::Unauthenticated;
            }
        }
        self.publish_locked(&state);
        self.snapshot()
    }

    /// Stops the session subscription and clears all state.
    pub async fn dispose(&self) {
        let mut state = self.inner.state.write().await;
        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
        self.clear_locked(&mut state);
        self.publish_locked(&state);
    }

    fn spawn_listener(
        &self,
        mut changes: tokio::sync::broadcast::Receiver<SessionChange>,
    ) -> JoinHandle<()> {
        let weak = self.downgrade();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(coordinator) = weak.upgrade() else {
                            break;
                        };
                        coordinator.handle_session_change(change).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "[Coordinator] Session listener lagged, {} notifications skipped",
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("[Coordinator] Session change channel closed");
                        break;
                    }
                }
            }
        })
    }

    // ============================================================================
    // Session transitions
    // ============================================================================

    /// Applies a session-change notification.
    ///
    /// Handled identically in every phase. A notification for the current
    /// principal only replaces the credential (token refresh). A different
    /// principal discards profile state and starts a new load. `None` clears
    /// everything; loads still in flight become stale.
    pub async fn handle_session_change(&self, change: SessionChange) {
        let mut state = self.inner.state.write().await;
        match change {
            None => {
                if state.session.is_some() {
                    tracing::info!("[Coordinator] Session ended");
                }
                self.clear_locked(&mut state);
            }
            Some(session) if state.user_id() == Some(session.user_id()) => {
                tracing::debug!(
                    "[Coordinator] Session credential refreshed for {}",
                    session.user_id()
                );
                state.session = Some(session);
            }
            Some(session) => {
                tracing::info!("[Coordinator] Signed in as {}", session.user_id());
                self.clear_locked(&mut state);
                self.adopt_session_locked(&mut state, session);
            }
        }
        self.publish_locked(&state);
    }

    /// Checks credentials with the remote store.
    ///
    /// Does not touch local state; the resulting session change arrives
    /// through the notification channel.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        let credentials = Credentials::parse(email, password)?;
        self.inner
            .store
            .sign_in_with_password(credentials.email(), credentials.password())
            .await
            .inspect_err(|e| tracing::debug!("[Coordinator] Sign-in rejected: {}", e))
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        let credentials = Credentials::parse(email, password)?;
        self.inner
            .store
            .sign_up(credentials.email(), credentials.password())
            .await
            .inspect_err(|e| tracing::debug!("[Coordinator] Sign-up rejected: {}", e))
    }

    /// Clears local state, then asks the remote store to end the session.
    ///
    /// Local state is cleared even when the remote call fails; the remote
    /// error is still returned.
    pub async fn sign_out(&self) -> Result<()> {
        {
            let mut state = self.inner.state.write().await;
            self.clear_locked(&mut state);
            self.publish_locked(&state);
        }

        self.inner
            .store
            .sign_out()
            .await
            .inspect_err(|e| tracing::warn!("[Coordinator] Remote sign-out failed: {}", e))
    }

    fn adopt_session_locked(&self, state: &mut CoordinatorState, session: Session) {
        let user_id = session.user_id().to_string();
        state.session = Some(session);
        let _ = self.start_load_locked(state, user_id);
    }

    fn clear_locked(&self, state: &mut CoordinatorState) {
        state.epoch += 1;
        state.phase = SessionPhase::Unauthenticated;
        state.session = None;
        state.profile = None;
        state.last_error = None;
        state.in_flight = None;
        state.creating = None;
        state.detaching.clear();
    }

    // ============================================================================
    // Profile loading
    // ============================================================================

    /// Reloads the profile of the current principal.
    ///
    /// Concurrent calls share the load already in flight. Returns the
    /// profile visible after the load; if the session changed meanwhile the
    /// load result is dropped and the current profile is returned instead.
    pub async fn refresh_profile(&self) -> Result<Option<Profile>> {
        let load = {
            let mut state = self.inner.state.write().await;
            let user_id = state
                .user_id()
                .map(str::to_string)
                .ok_or(BarterError::NotAuthenticated)?;
            let load = self.start_load_locked(&mut state, user_id);
            self.publish_locked(&state);
            load
        };

        match load.await {
            Err(e) if e.is_stale() => Ok(self.snapshot().profile),
            other => other,
        }
    }

    fn start_load_locked(&self, state: &mut CoordinatorState, user_id: String) -> SharedLoad {
        if let Some(in_flight) = &state.in_flight
            && in_flight.epoch == state.epoch
            && in_flight.user_id == user_id
        {
            return in_flight.future.clone();
        }

        state.next_load_id += 1;
        let load_id = state.next_load_id;
        let epoch = state.epoch;
        let store = Arc::clone(&self.inner.store);
        let weak = self.downgrade();
        let target = user_id.clone();

        let future = async move {
            let result = store.query_profile(&target).await;
            match weak.upgrade() {
                Some(coordinator) => {
                    coordinator
                        .finish_load(load_id, epoch, &target, result)
                        .await
                }
                None => Err(BarterError::StaleResponseDiscarded),
            }
        }
        .boxed()
        .shared();

        tracing::debug!("[Coordinator] Loading profile for {} (load {})", user_id, load_id);
        state.in_flight = Some(InFlightLoad {
            load_id,
            epoch,
            user_id,
            future: future.clone(),
        });
        state.phase = SessionPhase::LoadingProfile;

        // Drive the load even if no caller awaits it.
        tokio::spawn(future.clone());
        future
    }

    /// Called after every local profile mutation. A load that was already
    /// in flight may have read the row before the mutation, so its result
    /// is discarded and a fresh load is issued.
    fn supersede_load_locked(&self, state: &mut CoordinatorState) {
        if let Some(stale) = state.in_flight.take() {
            tracing::debug!(
                "[Coordinator] Local edit supersedes profile load {}",
                stale.load_id
            );
            let _ = self.start_load_locked(state, stale.user_id);
        }
    }

    async fn finish_load(
        &self,
        load_id: u64,
        epoch: u64,
        user_id: &str,
        result: Result<Option<Profile>>,
    ) -> Result<Option<Profile>> {
        let mut state = self.inner.state.write().await;
        let current = state.epoch == epoch
            && state.user_id() == Some(user_id)
            && state
                .in_flight
                .as_ref()
                .is_some_and(|l| l.load_id == load_id);
        if !current {
            tracing::debug!(
                "[Coordinator] Discarding stale profile load {} for {}",
                load_id,
                user_id
            );
            return Err(BarterError::StaleResponseDiscarded);
        }
        state.in_flight = None;

        let outcome = match result {
            Ok(mut profile) => {
                // The row may still hold links whose delete is in flight.
                if let Some(loaded) = profile.as_mut()
                    && !state.detaching.is_empty()
                {
                    loaded.tags.retain(|l| !state.detaching.contains(&l.id));
                }
                state.profile = profile;
                state.phase = SessionPhase::Ready;
                state.last_error = None;
                self.recompute_locked(&mut state);
                Ok(state.profile.clone())
            }
            Err(e) if e.is_auth() => {
                tracing::warn!("[Coordinator] Session rejected while loading profile: {}", e);
                self.clear_locked(&mut state);
                Err(e)
            }
            Err(e) => {
                // Keep the last known profile visible.
                tracing::warn!("[Coordinator] Profile load failed for {}: {}", user_id, e);
                state.phase = SessionPhase::ProfileUnavailable;
                state.last_error = Some(e.clone());
                Err(e)
            }
        };
        self.publish_locked(&state);
        outcome
    }

    // ============================================================================
    // Profile edits
    // ============================================================================

    /// Saves profile fields, creating the profile on first edit.
    ///
    /// Local tag links are kept; only the scalar fields are replaced by the
    /// server's response.
    pub async fn save_profile(&self, fields: ProfileFields) -> Result<Profile> {
        let fields = fields.validated()?;
        let (user_id, epoch, exists) = {
            let state = self.inner.state.read().await;
            let user_id = state
                .user_id()
                .map(str::to_string)
                .ok_or(BarterError::NotAuthenticated)?;
            (user_id, state.epoch, state.profile.is_some())
        };

        let saved = if exists {
            self.inner.store.update_profile(&user_id, &fields).await?
        } else {
            tracing::info!("[Coordinator] Creating profile for {}", user_id);
            self.inner.store.create_profile(&user_id, &fields).await?
        };

        let mut state = self.inner.state.write().await;
        if state.epoch != epoch {
            tracing::debug!("[Coordinator] Discarding profile save for {}", user_id);
            return Ok(saved);
        }
        let merged = match state.profile.as_mut() {
            Some(profile) if profile.id == saved.id => {
                profile.merge_fields_from(&saved);
                true
            }
            _ => false,
        };
        if !merged {
            state.profile = Some(saved);
        }
        self.supersede_load_locked(&mut state);
        self.recompute_locked(&mut state);
        self.publish_locked(&state);
        state
            .profile
            .clone()
            .ok_or_else(|| BarterError::internal("profile missing after save"))
    }

    /// Returns the current profile, creating an empty one if none exists.
    ///
    /// A load already in flight is awaited first, since the profile may
    /// exist remotely. Concurrent callers share a single create request.
    pub async fn ensure_profile(&self) -> Result<Profile> {
        let pending_load = {
            let state = self.inner.state.read().await;
            state
                .in_flight
                .as_ref()
                .filter(|l| l.epoch == state.epoch)
                .map(|l| l.future.clone())
        };
        if let Some(load) = pending_load
            && let Err(e) = load.await
            && !e.is_stale()
        {
            tracing::debug!("[Coordinator] Load before profile creation failed: {}", e);
        }

        let create = {
            let mut state = self.inner.state.write().await;
            if let Some(profile) = &state.profile {
                return Ok(profile.clone());
            }
            if state.session.is_none() {
                return Err(BarterError::NotAuthenticated);
            }
            match &state.creating {
                Some(pending) if pending.epoch == state.epoch => pending.future.clone(),
                _ => self.start_create_locked(&mut state),
            }
        };

        match create.await {
            Err(e) if e.is_stale() => self
                .snapshot()
                .profile
                .ok_or(BarterError::NotAuthenticated),
            other => other,
        }
    }

    fn start_create_locked(&self, state: &mut CoordinatorState) -> SharedCreate {
        state.next_create_id += 1;
        let create_id = state.next_create_id;
        let weak = self.downgrade();

        let future = async move {
            let Some(coordinator) = weak.upgrade() else {
                return Err(BarterError::StaleResponseDiscarded);
            };
            let result = coordinator.save_profile(ProfileFields::default()).await;
            let mut state = coordinator.inner.state.write().await;
            if state
                .creating
                .as_ref()
                .is_some_and(|c| c.create_id == create_id)
            {
                state.creating = None;
            }
            result
        }
        .boxed()
        .shared();

        state.creating = Some(PendingCreate {
            create_id,
            epoch: state.epoch,
            future: future.clone(),
        });
        future
    }

    // ============================================================================
    // Tag link effects, applied on behalf of the tag workflow
    // ============================================================================

    /// Appends a confirmed link. Returns the link now visible for its tag,
    /// or `None` if the profile changed while the insert was in flight.
    pub(crate) async fn insert_link(&self, link: ProfileTagLink) -> Option<ProfileTagLink> {
        let mut state = self.inner.state.write().await;
        let profile = state.profile.as_mut().filter(|p| p.id == link.profile_id)?;
        if let Some(existing) = profile.link_for_tag(link.tag_id()) {
            return Some(existing.clone());
        }
        profile.tags.push(link.clone());
        self.supersede_load_locked(&mut state);
        self.recompute_locked(&mut state);
        self.publish_locked(&state);
        Some(link)
    }

    /// Optimistically removes a link by id.
    ///
    /// Until the returned detach is passed to
    /// [`finish_detach`](Self::finish_detach), loaded profiles do not bring
    /// the link back.
    pub(crate) async fn remove_link(&self, profile_id: &str, link_id: &str) -> Option<PendingDetach> {
        let mut state = self.inner.state.write().await;
        if state.profile_id() != Some(profile_id) {
            return None;
        }
        let profile = state.profile.as_mut()?;
        let index = profile.tags.iter().position(|l| l.id == link_id)?;
        let link = profile.tags.remove(index);
        state.detaching.insert(link.id.clone());
        self.supersede_load_locked(&mut state);
        self.recompute_locked(&mut state);
        self.publish_locked(&state);
        Some(PendingDetach {
            profile_id: profile_id.to_string(),
            index,
            link,
            epoch: state.epoch,
        })
    }

    /// Puts a removed link back at its former position.
    ///
    /// Skipped when the profile changed or the tag is linked again.
    pub(crate) async fn restore_link(&self, detach: &PendingDetach) -> bool {
        let mut state = self.inner.state.write().await;
        let Some(profile) = state
            .profile
            .as_mut()
            .filter(|p| p.id == detach.profile_id)
        else {
            return false;
        };
        if profile.has_tag(detach.link.tag_id()) {
            return false;
        }
        let index = detach.index.min(profile.tags.len());
        profile.tags.insert(index, detach.link.clone());
        self.recompute_locked(&mut state);
        self.publish_locked(&state);
        true
    }

    /// Marks a detach as settled, after the remote delete or its rollback.
    pub(crate) async fn finish_detach(&self, detach: PendingDetach) {
        let mut state = self.inner.state.write().await;
        if state.epoch != detach.epoch || !state.detaching.remove(&detach.link.id) {
            return;
        }
        // A load issued while the delete was in flight may predate it.
        if state.in_flight.is_some() {
            self.supersede_load_locked(&mut state);
            self.publish_locked(&state);
        }
    }

    // ============================================================================
    // Internals
    // ============================================================================

    fn recompute_locked(&self, state: &mut CoordinatorState) {
        if let Some(profile) = state.profile.as_mut() {
            profile.is_complete = self.inner.evaluator.evaluate(profile).is_complete;
        }
    }

    fn publish_locked(&self, state: &CoordinatorState) {
        let snapshot = ProfileSnapshot {
            phase: state.phase,
            principal: state.session.as_ref().map(|s| s.principal.clone()),
            profile: state.profile.clone(),
            completion: self
                .inner
                .evaluator
                .evaluate_optional(state.profile.as_ref()),
            profile_loading: state.in_flight.is_some(),
            last_error: state.last_error.clone(),
        };
        self.inner.snapshot_tx.send_replace(snapshot);
    }
}
