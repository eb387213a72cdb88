//! TOML-backed preference store.
//!
//! Preferences live in a flat `key = "value"` table. Writes go to a
//! temporary file in the same directory followed by a rename, so a crash
//! mid-write never leaves a truncated file behind.

use crate::paths::BarterPaths;
use async_trait::async_trait;
use barter_core::error::{BarterError, Result};
use barter_core::preferences::PreferenceStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

type PreferenceTable = BTreeMap<String, String>;

pub struct TomlPreferenceStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl TomlPreferenceStore {
    /// Creates a store at the platform default `preferences.toml`.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(BarterPaths::preferences_file()?))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_table(&self) -> Result<PreferenceTable> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PreferenceTable::new());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(PreferenceTable::new());
        }
        Ok(toml::from_str(&content)?)
    }

    async fn write_table(&self, table: &PreferenceTable) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| BarterError::io("preference path has no parent directory"))?;
        fs::create_dir_all(parent).await?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| BarterError::io("preference path has no file name"))?;
        let tmp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

        let content = toml::to_string_pretty(table)?;
        let mut tmp_file = fs::File::create(&tmp_path).await?;
        tmp_file.write_all(content.as_bytes()).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for TomlPreferenceStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_table().await?.remove(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.read_table().await?;
        table.insert(key.to_string(), value.to_string());
        self.write_table(&table).await?;
        tracing::debug!("[Preferences] Saved {} to {}", key, self.path.display());
        Ok(())
    }
}
