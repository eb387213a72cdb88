//! Engine configuration model.

use crate::error::Result;
use crate::profile::CompletionPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_MAX_SUGGESTIONS: usize = 20;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub completion: CompletionPolicy,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.completion.validate()
    }
}

/// Suggestion search tuning.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Quiescence window before a query is sent.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl SearchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_results: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_max_results() -> usize {
    DEFAULT_MAX_SUGGESTIONS
}
