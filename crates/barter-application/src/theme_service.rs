//! Theme preference service.
//!
//! Persistence is best-effort: a failing preference store never blocks the
//! UI, it only means the choice is not remembered across launches.

use barter_core::preferences::{PreferenceStore, THEME_MODE_KEY, ThemeMode};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds the current [`ThemeMode`] and mirrors it to the preference store.
#[derive(Clone)]
pub struct ThemeService {
    store: Arc<dyn PreferenceStore>,
    mode: Arc<RwLock<ThemeMode>>,
}

impl ThemeService {
    /// Creates the service with the default `system` mode. Call
    /// [`init`](Self::init) to pick up the persisted value.
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            mode: Arc::new(RwLock::new(ThemeMode::default())),
        }
    }

    /// Loads the persisted mode. Missing, unreadable or unknown values fall
    /// back to `system`.
    pub async fn init(&self) -> ThemeMode {
        let loaded = match self.store.load(THEME_MODE_KEY).await {
            Ok(Some(raw)) => ThemeMode::from_str(raw.trim()).unwrap_or_else(|_| {
                tracing::warn!("[ThemeService] Unknown theme mode '{}', using system", raw);
                ThemeMode::default()
            }),
            Ok(None) => ThemeMode::default(),
            Err(e) => {
                tracing::warn!("[ThemeService] Failed to load theme mode: {}", e);
                ThemeMode::default()
            }
        };
        *self.mode.write().await = loaded;
        loaded
    }

    pub async fn mode(&self) -> ThemeMode {
        *self.mode.read().await
    }

    /// Switches the mode, then persists it. A failed save is logged and
    /// otherwise ignored.
    pub async fn set_mode(&self, mode: ThemeMode) {
        *self.mode.write().await = mode;
        if let Err(e) = self.store.save(THEME_MODE_KEY, &mode.to_string()).await {
            tracing::warn!("[ThemeService] Failed to persist theme mode {}: {}", mode, e);
        }
    }
}
