use serde::{Deserialize, Serialize};

use super::{check_name, check_weights, FieldViolation};
use crate::workflows::allocation::domain::{AnalystProfile, ScoreBand};

/// Weighting used when matching analysts to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub name: String,
    pub weights: DistributionWeights,
    /// Ceiling applied to analysts without a personal capacity.
    pub default_capacity: i32,
    pub thresholds: ScoreThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionWeights {
    pub stack_fit: i32,
    pub client_fit: i32,
    pub availability: i32,
    pub success_rate: i32,
}

/// Lower bounds (inclusive) of each band on the 0-100 total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub excellent: i32,
    pub good: i32,
    pub regular: i32,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            weights: DistributionWeights {
                stack_fit: 40,
                client_fit: 30,
                availability: 20,
                success_rate: 10,
            },
            default_capacity: 10,
            thresholds: ScoreThresholds {
                excellent: 80,
                good: 60,
                regular: 40,
            },
        }
    }
}

impl DistributionConfig {
    pub fn violations(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        check_name(&self.name, &mut violations);
        check_weights(
            &[
                ("weights.stack_fit", self.weights.stack_fit),
                ("weights.client_fit", self.weights.client_fit),
                ("weights.availability", self.weights.availability),
                ("weights.success_rate", self.weights.success_rate),
            ],
            &mut violations,
        );

        if self.default_capacity < 1 {
            violations.push(FieldViolation::new(
                "default_capacity",
                format!("must be at least 1 (found {})", self.default_capacity),
            ));
        }

        let ScoreThresholds {
            excellent,
            good,
            regular,
        } = self.thresholds;
        for (field, value) in [
            ("thresholds.excellent", excellent),
            ("thresholds.good", good),
            ("thresholds.regular", regular),
        ] {
            if !(0..=100).contains(&value) {
                violations.push(FieldViolation::new(
                    field,
                    format!("must be between 0 and 100 (found {value})"),
                ));
            }
        }
        if excellent <= good {
            violations.push(FieldViolation::new(
                "thresholds.excellent",
                format!("must be greater than the good threshold ({good})"),
            ));
        }
        if good <= regular {
            violations.push(FieldViolation::new(
                "thresholds.good",
                format!("must be greater than the regular threshold ({regular})"),
            ));
        }

        violations
    }

    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("weights.stack_fit", self.weights.stack_fit.to_string()),
            ("weights.client_fit", self.weights.client_fit.to_string()),
            ("weights.availability", self.weights.availability.to_string()),
            ("weights.success_rate", self.weights.success_rate.to_string()),
            ("default_capacity", self.default_capacity.to_string()),
            ("thresholds.excellent", self.thresholds.excellent.to_string()),
            ("thresholds.good", self.thresholds.good.to_string()),
            ("thresholds.regular", self.thresholds.regular.to_string()),
        ]
    }

    pub fn band_for(&self, total: u8) -> ScoreBand {
        let total = i32::from(total);
        if total >= self.thresholds.excellent {
            ScoreBand::Excellent
        } else if total >= self.thresholds.good {
            ScoreBand::Good
        } else if total >= self.thresholds.regular {
            ScoreBand::Regular
        } else {
            ScoreBand::Critical
        }
    }

    pub fn capacity_for(&self, analyst: &AnalystProfile) -> u32 {
        analyst
            .capacity
            .unwrap_or_else(|| u32::try_from(self.default_capacity.max(1)).unwrap_or(1))
    }
}
