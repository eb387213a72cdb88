//! Profile domain module.
//!
//! # Module Structure
//!
//! - `model`: the profile record and its editable fields
//! - `completion`: the completeness policy table and evaluator

mod completion;
mod model;

pub use completion::{
    CompletionPolicy, CompletionRequirement, ProfileCompletion, ProfileCompletionEvaluator,
    ProfileField,
};
pub use model::{Profile, ProfileFields, Visibility};
