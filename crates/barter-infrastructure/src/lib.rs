//! Infrastructure adapters for Barter.
//!
//! Concrete implementations of the `barter-core` boundary traits plus the
//! bootstrap concerns (configuration file, paths, tracing).

pub mod config_service;
pub mod in_memory_store;
pub mod logging;
pub mod paths;
pub mod toml_preference_store;

pub use crate::config_service::ConfigService;
pub use crate::in_memory_store::InMemoryRemoteStore;
pub use crate::paths::BarterPaths;
pub use crate::toml_preference_store::TomlPreferenceStore;
