//! Error types for the Barter engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generic prompt shown for failed tag operations.
pub const TAG_RETRY_PROMPT: &str = "Could not update your tags. Please try again.";

/// Shown for local failures that carry nothing useful for the user.
pub const GENERIC_ERROR_PROMPT: &str = "Something went wrong. Please try again.";

/// A shared error type for the entire Barter engine.
///
/// Every operation exposed to the UI layer returns this type instead of
/// panicking, so inline error states can be rendered. The enum is `Clone`
/// and serializable because errors are attached to published snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarterError {
    /// Bad credentials or an expired session. Never retried silently.
    #[error("{message}")]
    Auth { message: String },

    /// Transient remote failure. Safe to retry.
    #[error("Network error: {0}")]
    Network(String),

    /// Client-side form input error, raised before any network call.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Remote uniqueness constraint violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The operation needs an authenticated session.
    #[error("Not signed in")]
    NotAuthenticated,

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A response arrived for superseded input and was ignored.
    #[error("Stale response discarded")]
    StaleResponseDiscarded,

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BarterError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an Auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a Validation error for the given form field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleResponseDiscarded)
    }

    /// Whether the caller may reissue the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// The remote's own text, without the kind prefix, for errors that
    /// carry one.
    fn remote_text(&self) -> Option<&str> {
        match self {
            Self::Auth { message } => Some(message),
            Self::Network(message) | Self::Conflict(message) => Some(message),
            _ => None,
        }
    }

    /// Text to show for a failed sign-in or sign-up. The remote error is
    /// passed through verbatim.
    pub fn auth_message(&self) -> String {
        self.remote_text()
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string())
    }

    /// Text to show for a failed tag attach or detach.
    ///
    /// Input and session problems are named; every other failure becomes
    /// [`TAG_RETRY_PROMPT`].
    pub fn tag_message(&self) -> String {
        match self {
            Self::Validation { .. } | Self::NotAuthenticated => self.to_string(),
            _ => TAG_RETRY_PROMPT.to_string(),
        }
    }

    /// Text to show for any other failed operation, such as a profile save.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { .. } | Self::NotAuthenticated | Self::NotFound { .. } => {
                self.to_string()
            }
            Self::Auth { .. } | Self::Network(_) | Self::Conflict(_) => self.auth_message(),
            _ => GENERIC_ERROR_PROMPT.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for BarterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for BarterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for BarterError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for BarterError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, BarterError>`.
pub type Result<T> = std::result::Result<T, BarterError>;
