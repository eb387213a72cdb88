//! Session application services.
//!
//! This module contains the session/profile lifecycle state machine and the
//! snapshot type it publishes to the UI layer.

mod coordinator;
mod snapshot;

pub use coordinator::{SessionProfileCoordinator, WeakCoordinator};
pub use snapshot::{ProfileSnapshot, SessionPhase};
