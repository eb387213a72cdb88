//! Application layer for Barter.
//!
//! Use-case services that keep session, profile and tag state coherent on
//! top of the boundary traits defined in `barter-core`.

pub mod engine;
pub mod session;
pub mod suggestion;
pub mod tag_association;
pub mod theme_service;

#[cfg(test)]
mod test_support;

pub use engine::BarterEngine;
pub use session::{ProfileSnapshot, SessionPhase, SessionProfileCoordinator, WeakCoordinator};
pub use suggestion::{SuggestionResults, SuggestionSearchEngine};
pub use tag_association::TagAssociationManager;
pub use theme_service::ThemeService;
