//! Versioned weighting configurations for analyst distribution and job prioritization.
//!
//! A configuration is immutable once stored. Proposing new values validates the whole payload,
//! stores it under the next version, and supersedes the previous active row of the same kind.

mod distribution;
mod prioritization;
mod store;

pub use distribution::{DistributionConfig, DistributionWeights, ScoreThresholds};
pub use prioritization::{PrioritizationConfig, PrioritizationWeights, UrgencyMultipliers};
pub use store::{ConfigurationStore, WeightingError};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    Distribution,
    Prioritization,
}

impl ConfigKind {
    pub const fn label(self) -> &'static str {
        match self {
            ConfigKind::Distribution => "distribution",
            ConfigKind::Prioritization => "prioritization",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ConfigKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "distribution" => Ok(Self::Distribution),
            "prioritization" | "priority" => Ok(Self::Prioritization),
            other => Err(format!("unknown configuration kind '{other}'")),
        }
    }
}

/// One broken rule, addressed by the dotted field path a form can highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Either configuration kind, as stored and proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightingProfile {
    Distribution(DistributionConfig),
    Prioritization(PrioritizationConfig),
}

impl WeightingProfile {
    pub fn kind(&self) -> ConfigKind {
        match self {
            WeightingProfile::Distribution(_) => ConfigKind::Distribution,
            WeightingProfile::Prioritization(_) => ConfigKind::Prioritization,
        }
    }

    pub fn default_for(kind: ConfigKind) -> Self {
        match kind {
            ConfigKind::Distribution => Self::Distribution(DistributionConfig::default()),
            ConfigKind::Prioritization => Self::Prioritization(PrioritizationConfig::default()),
        }
    }

    pub fn violations(&self) -> Vec<FieldViolation> {
        match self {
            WeightingProfile::Distribution(config) => config.violations(),
            WeightingProfile::Prioritization(config) => config.violations(),
        }
    }

    /// Flattened `(field, value)` pairs used to diff versions.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            WeightingProfile::Distribution(config) => config.fields(),
            WeightingProfile::Prioritization(config) => config.fields(),
        }
    }
}

/// Stored configuration version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub version: u32,
    pub active: bool,
    pub profile: WeightingProfile,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl StoredConfig {
    pub fn kind(&self) -> ConfigKind {
        self.profile.kind()
    }
}

/// History entry for a single field changed by an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChange {
    pub kind: ConfigKind,
    pub version: u32,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    pub new_value: String,
    pub changed_by: UserId,
    pub changed_at: DateTime<Utc>,
}

/// Shared rule: every weight within [0, 100] and the set summing to exactly 100.
pub(crate) fn check_weights(weights: &[(&'static str, i32)], violations: &mut Vec<FieldViolation>) {
    for (field, value) in weights {
        if !(0..=100).contains(value) {
            violations.push(FieldViolation::new(
                *field,
                format!("must be between 0 and 100 (found {value})"),
            ));
        }
    }

    let total: i64 = weights.iter().map(|(_, value)| i64::from(*value)).sum();
    if total != 100 {
        violations.push(FieldViolation::new(
            "weights",
            format!("weights must sum to 100 (found {total})"),
        ));
    }
}

pub(crate) fn check_name(name: &str, violations: &mut Vec<FieldViolation>) {
    if name.trim().is_empty() {
        violations.push(FieldViolation::new("name", "must not be empty"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_weights_reports_every_out_of_range_field_and_the_sum() {
        let mut violations = Vec::new();
        check_weights(
            &[("weights.a", -5), ("weights.b", 150), ("weights.c", 10)],
            &mut violations,
        );

        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["weights.a", "weights.b", "weights"]);
        assert!(violations[2].message.contains("155"));
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(
            "Distribution".parse::<ConfigKind>(),
            Ok(ConfigKind::Distribution)
        );
        assert_eq!(
            " priority ".parse::<ConfigKind>(),
            Ok(ConfigKind::Prioritization)
        );
        assert!("payroll".parse::<ConfigKind>().is_err());
    }
}
