//! Configuration service implementation.
//!
//! Loads the [`EngineConfig`] from `config.toml` (by default
//! `~/.config/barter/config.toml`) and caches it.

use crate::paths::BarterPaths;
use barter_core::config::EngineConfig;
use barter_core::error::{BarterError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Configuration service that loads and caches the engine configuration.
///
/// A missing or empty file yields the defaults. A file that cannot be read
/// or parsed, or that fails validation, is a `Config` error and is not
/// cached.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<EngineConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the platform default config file.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(BarterPaths::config_file()?))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the configuration, loading from file if not cached.
    pub fn get_config(&self) -> Result<EngineConfig> {
        {
            let cached = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref config) = *cached {
                return Ok(config.clone());
            }
        }

        let loaded = Self::load_config(&self.path)?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn load_config(path: &Path) -> Result<EngineConfig> {
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] {} not found, using defaults",
                path.display()
            );
            return Ok(EngineConfig::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            BarterError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(EngineConfig::default());
        }

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            BarterError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        tracing::info!("[ConfigService] Loaded configuration from {}", path.display());
        Ok(config)
    }
}
