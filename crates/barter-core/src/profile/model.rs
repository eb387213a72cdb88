//! Profile domain model.

use crate::error::{BarterError, Result};
use crate::tag::{ProfileTagLink, TagKind};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 30;
const DISPLAY_NAME_MAX_LEN: usize = 60;
const BIO_MAX_LEN: usize = 500;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// One-per-principal profile record.
///
/// `tags` keeps insertion order; at most one link exists per tag id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Server-authoritative, recomputed locally after every mutation.
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub tags: Vec<ProfileTagLink>,
}

impl Profile {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            username: None,
            display_name: None,
            bio: None,
            visibility: Visibility::default(),
            is_complete: false,
            tags: Vec::new(),
        }
    }

    pub fn link_for_tag(&self, tag_id: &str) -> Option<&ProfileTagLink> {
        self.tags.iter().find(|link| link.tag.id == tag_id)
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.link_for_tag(tag_id).is_some()
    }

    pub fn links_of(&self, kind: TagKind) -> impl Iterator<Item = &ProfileTagLink> {
        self.tags.iter().filter(move |link| link.kind() == kind)
    }

    /// Copies the scalar fields of `other`, leaving tag links untouched.
    pub fn merge_fields_from(&mut self, other: &Profile) {
        self.username = other.username.clone();
        self.display_name = other.display_name.clone();
        self.bio = other.bio.clone();
        self.visibility = other.visibility;
        self.is_complete = other.is_complete;
    }
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl ProfileFields {
    /// Trims the text fields and checks them against the form rules.
    pub fn validated(self) -> Result<Self> {
        let username = self.username.map(|u| u.trim().to_string());
        if let Some(ref username) = username {
            let len = username.chars().count();
            if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
                return Err(BarterError::validation(
                    "username",
                    format!(
                        "must be between {} and {} characters",
                        USERNAME_MIN_LEN, USERNAME_MAX_LEN
                    ),
                ));
            }
            if !username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            {
                return Err(BarterError::validation(
                    "username",
                    "may only contain letters, digits, '_' and '.'",
                ));
            }
        }

        let display_name = self.display_name.map(|d| d.trim().to_string());
        if let Some(ref display_name) = display_name {
            if display_name.chars().count() > DISPLAY_NAME_MAX_LEN {
                return Err(BarterError::validation(
                    "display_name",
                    format!("must be at most {} characters", DISPLAY_NAME_MAX_LEN),
                ));
            }
        }

        let bio = self.bio.map(|b| b.trim().to_string());
        if let Some(ref bio) = bio {
            if bio.chars().count() > BIO_MAX_LEN {
                return Err(BarterError::validation(
                    "bio",
                    format!("must be at most {} characters", BIO_MAX_LEN),
                ));
            }
        }

        Ok(Self {
            username,
            display_name,
            bio,
            visibility: self.visibility,
        })
    }
}
