//! Profile completeness evaluation.
//!
//! The required fields and their weights live in a [`CompletionPolicy`]
//! table rather than being checked ad hoc by callers. Evaluation is pure:
//! the same profile and policy always produce the same verdict.

use super::model::Profile;
use crate::error::{BarterError, Result};
use crate::tag::TagKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{Display, EnumString};

/// A profile property the completion policy can require.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProfileField {
    Username,
    DisplayName,
    Bio,
    /// At least one `offer` tag.
    OfferTag,
    /// At least one `want` tag.
    WantTag,
}

impl ProfileField {
    fn is_satisfied_by(self, profile: &Profile) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        match self {
            Self::Username => present(&profile.username),
            Self::DisplayName => present(&profile.display_name),
            Self::Bio => present(&profile.bio),
            Self::OfferTag => profile.links_of(TagKind::Offer).next().is_some(),
            Self::WantTag => profile.links_of(TagKind::Want).next().is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequirement {
    pub field: ProfileField,
    pub weight: u32,
}

/// The table of required fields and their weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionPolicy {
    #[serde(default)]
    pub requirements: Vec<CompletionRequirement>,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        let requirement = |field| CompletionRequirement { field, weight: 25 };
        Self {
            requirements: vec![
                requirement(ProfileField::Username),
                requirement(ProfileField::DisplayName),
                requirement(ProfileField::OfferTag),
                requirement(ProfileField::WantTag),
            ],
        }
    }
}

impl CompletionPolicy {
    /// Rejects zero weights and fields listed more than once.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for requirement in &self.requirements {
            if requirement.weight == 0 {
                return Err(BarterError::config(format!(
                    "completion weight for '{}' must be positive",
                    requirement.field
                )));
            }
            if !seen.insert(requirement.field) {
                return Err(BarterError::config(format!(
                    "completion field '{}' is listed more than once",
                    requirement.field
                )));
            }
        }
        Ok(())
    }

    fn total_weight(&self) -> u64 {
        self.requirements.iter().map(|r| u64::from(r.weight)).sum()
    }
}

/// Result of evaluating a profile against the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCompletion {
    pub is_complete: bool,
    /// 0..=100, rounded down so that 100 always means complete.
    pub completion_percentage: u8,
    /// Unsatisfied fields, in policy order.
    pub missing_fields: Vec<ProfileField>,
}

impl ProfileCompletion {
    fn from_missing(policy: &CompletionPolicy, missing_fields: Vec<ProfileField>) -> Self {
        let total = policy.total_weight();
        let missing: u64 = policy
            .requirements
            .iter()
            .filter(|r| missing_fields.contains(&r.field))
            .map(|r| u64::from(r.weight))
            .sum();
        let completion_percentage = if total == 0 {
            100
        } else {
            ((total - missing) * 100 / total) as u8
        };

        Self {
            is_complete: missing_fields.is_empty(),
            completion_percentage,
            missing_fields,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileCompletionEvaluator {
    policy: CompletionPolicy,
}

impl ProfileCompletionEvaluator {
    pub fn new(policy: CompletionPolicy) -> Self {
        Self { policy }
    }

    /// Evaluates a (possibly partially loaded) profile.
    pub fn evaluate(&self, profile: &Profile) -> ProfileCompletion {
        let missing = self
            .policy
            .requirements
            .iter()
            .map(|r| r.field)
            .filter(|field| !field.is_satisfied_by(profile))
            .collect();
        ProfileCompletion::from_missing(&self.policy, missing)
    }

    /// Evaluates an absent profile as having every required field missing.
    pub fn evaluate_optional(&self, profile: Option<&Profile>) -> ProfileCompletion {
        match profile {
            Some(profile) => self.evaluate(profile),
            None => {
                let missing = self.policy.requirements.iter().map(|r| r.field).collect();
                ProfileCompletion::from_missing(&self.policy, missing)
            }
        }
    }
}
