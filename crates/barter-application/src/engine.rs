//! Wiring of the application services around one remote store.

use crate::session::{ProfileSnapshot, SessionProfileCoordinator};
use crate::suggestion::SuggestionSearchEngine;
use crate::tag_association::TagAssociationManager;
use crate::theme_service::ThemeService;
use barter_core::config::EngineConfig;
use barter_core::error::Result;
use barter_core::preferences::PreferenceStore;
use barter_core::profile::ProfileCompletionEvaluator;
use barter_core::remote::RemoteStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// The services a UI binds to, built from one [`EngineConfig`].
///
/// The coordinator is the only strong owner of profile state; the search
/// engine and the tag workflow hold weak handles to it.
pub struct BarterEngine {
    coordinator: SessionProfileCoordinator,
    suggestions: SuggestionSearchEngine,
    tags: TagAssociationManager,
    theme: ThemeService,
    /// Clears suggestions on sign-out; running between `init` and `dispose`.
    session_follower: Mutex<Option<JoinHandle<()>>>,
}

impl BarterEngine {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        preferences: Arc<dyn PreferenceStore>,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let evaluator = ProfileCompletionEvaluator::new(config.completion.clone());
        let coordinator = SessionProfileCoordinator::new(Arc::clone(&store), evaluator);
        let suggestions = SuggestionSearchEngine::new(
            Arc::clone(&store),
            coordinator.downgrade(),
            config.search.clone(),
        );
        let tags = TagAssociationManager::new(store, coordinator.downgrade());

        Ok(Self {
            coordinator,
            suggestions,
            tags,
            theme: ThemeService::new(preferences),
            session_follower: Mutex::new(None),
        })
    }

    /// Loads the theme preference and starts the session lifecycle.
    pub async fn init(&self) -> ProfileSnapshot {
        let mode = self.theme.init().await;
        tracing::debug!("[BarterEngine] Theme mode: {}", mode);
        let follower = self.suggestions.follow_session(&self.coordinator);
        if let Some(previous) = self.follower_slot().replace(follower) {
            previous.abort();
        }
        let snapshot = self.coordinator.init().await;
        tracing::info!("[BarterEngine] Initialized in phase {}", snapshot.phase);
        snapshot
    }

    pub async fn dispose(&self) {
        if let Some(follower) = self.follower_slot().take() {
            follower.abort();
        }
        self.suggestions.clear().await;
        self.coordinator.dispose().await;
        tracing::info!("[BarterEngine] Disposed");
    }

    fn follower_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.session_follower
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn coordinator(&self) -> &SessionProfileCoordinator {
        &self.coordinator
    }

    pub fn suggestions(&self) -> &SuggestionSearchEngine {
        &self.suggestions
    }

    pub fn tags(&self) -> &TagAssociationManager {
        &self.tags
    }

    pub fn theme(&self) -> &ThemeService {
        &self.theme
    }
}
