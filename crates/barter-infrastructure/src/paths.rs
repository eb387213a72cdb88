//! Path management for Barter configuration files.
//!
//! ```text
//! ~/.config/barter/          # Config directory (platform dependent)
//! ├── config.toml            # Engine configuration
//! └── preferences.toml       # UI preferences (theme mode, ...)
//! ```

use barter_core::error::{BarterError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "barter";
const CONFIG_FILE: &str = "config.toml";
const PREFERENCES_FILE: &str = "preferences.toml";

pub struct BarterPaths;

impl BarterPaths {
    /// Returns the Barter configuration directory, e.g. `~/.config/barter/`.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| BarterError::config("cannot determine the configuration directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn preferences_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(PREFERENCES_FILE))
    }
}
