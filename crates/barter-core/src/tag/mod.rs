//! Tag domain module.
//!
//! Tags are a read-only, system-defined catalog. The engine only references
//! them through [`ProfileTagLink`]s.

mod model;

pub use model::{ProfileTagLink, SuggestionQuery, Tag, TagKind, normalize_tag_name};
