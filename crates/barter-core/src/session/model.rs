//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated identity associated with a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Remote user id. Profiles are keyed by this value.
    pub user_id: String,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// An authenticated session.
///
/// Exists only while authenticated. The access token is opaque to the
/// engine; it is carried so that token refreshes can be observed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub principal: Principal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, principal: Principal) -> Self {
        Self {
            access_token: access_token.into(),
            principal,
            expires_at: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.principal.user_id
    }
}

// Keep tokens out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("principal", &self.principal)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A session-change notification from the remote store.
///
/// `None` means signed out or invalidated; `Some` covers sign-in and
/// token refresh alike.
pub type SessionChange = Option<Session>;
