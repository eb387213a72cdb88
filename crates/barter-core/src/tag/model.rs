use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which profile section a tag belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TagKind {
    /// Something the user can offer.
    Offer,
    /// Something the user wants.
    Want,
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub kind: TagKind,
    #[serde(default)]
    pub usage_count: u64,
}

impl Tag {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: TagKind) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            normalized_name: normalize_tag_name(&name),
            name,
            kind,
            usage_count: 0,
        }
    }
}

/// Lowercases and collapses whitespace, the form tags are matched on.
pub fn normalize_tag_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Join entity connecting one profile to one tag.
///
/// Removal goes by `id`, never by tag id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTagLink {
    pub id: String,
    pub profile_id: String,
    pub tag: Tag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProfileTagLink {
    pub fn tag_id(&self) -> &str {
        &self.tag.id
    }

    pub fn kind(&self) -> TagKind {
        self.tag.kind
    }
}

/// A single suggestion request, ordered by `sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionQuery {
    pub kind: TagKind,
    pub text: String,
    pub sequence: u64,
}
