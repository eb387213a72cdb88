//! Domain layer for Barter.
//!
//! Models, boundary traits and pure policy shared by the application and
//! infrastructure crates.

pub mod config;
pub mod error;
pub mod preferences;
pub mod profile;
pub mod remote;
pub mod session;
pub mod tag;

// Re-export common error type
pub use error::{BarterError, Result};
