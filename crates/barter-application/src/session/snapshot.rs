use barter_core::BarterError;
use barter_core::profile::{Profile, ProfileCompletion};
use barter_core::session::Principal;
use barter_core::tag::ProfileTagLink;
use serde::Serialize;
use strum::Display;

/// Lifecycle phase of the session/profile state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionPhase {
    Unauthenticated,
    /// Initial session check in flight.
    AuthenticatingSession,
    LoadingProfile,
    Ready,
    /// Profile load failed while the session is still valid.
    ProfileUnavailable,
}

impl SessionPhase {
    pub fn is_authenticated(self) -> bool {
        matches!(
            self,
            Self::LoadingProfile | Self::Ready | Self::ProfileUnavailable
        )
    }
}

/// Read-only view of the coordinator state handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSnapshot {
    pub phase: SessionPhase,
    pub principal: Option<Principal>,
    pub profile: Option<Profile>,
    pub completion: ProfileCompletion,
    pub profile_loading: bool,
    /// Error of the last failed profile load, kept until the next success.
    pub last_error: Option<BarterError>,
}

impl ProfileSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.user_id.as_str())
    }

    pub fn tag_links(&self) -> &[ProfileTagLink] {
        self.profile.as_ref().map_or(&[][..], |p| p.tags.as_slice())
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.profile.as_ref().is_some_and(|p| p.has_tag(tag_id))
    }
}
