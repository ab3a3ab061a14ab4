use serde::{Deserialize, Serialize};

use super::{check_name, check_weights, FieldViolation};
use crate::workflows::allocation::domain::UrgencyTier;

const MAX_VIP_BONUS: i32 = 50;
const MAX_MULTIPLIER: f32 = 5.0;

/// Weighting used to order open jobs by urgency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizationConfig {
    pub name: String,
    pub weights: PrioritizationWeights,
    /// Points added on top of the weighted score for VIP clients.
    pub vip_bonus: i32,
    pub multipliers: UrgencyMultipliers,
    /// Billing value at which the billing factor saturates.
    pub billing_reference: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritizationWeights {
    pub deadline_urgency: i32,
    pub billing_value: i32,
    pub time_open: i32,
    pub stack_complexity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UrgencyMultipliers {
    pub low: f32,
    pub medium: f32,
    pub high: f32,
    pub critical: f32,
}

impl UrgencyMultipliers {
    pub fn for_tier(&self, tier: UrgencyTier) -> f32 {
        match tier {
            UrgencyTier::Low => self.low,
            UrgencyTier::Medium => self.medium,
            UrgencyTier::High => self.high,
            UrgencyTier::Critical => self.critical,
        }
    }
}

impl Default for PrioritizationConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            weights: PrioritizationWeights {
                deadline_urgency: 35,
                billing_value: 30,
                time_open: 20,
                stack_complexity: 15,
            },
            vip_bonus: 10,
            multipliers: UrgencyMultipliers {
                low: 0.8,
                medium: 1.0,
                high: 1.2,
                critical: 1.5,
            },
            billing_reference: 20_000,
        }
    }
}

impl PrioritizationConfig {
    pub fn violations(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        check_name(&self.name, &mut violations);
        check_weights(
            &[
                ("weights.deadline_urgency", self.weights.deadline_urgency),
                ("weights.billing_value", self.weights.billing_value),
                ("weights.time_open", self.weights.time_open),
                ("weights.stack_complexity", self.weights.stack_complexity),
            ],
            &mut violations,
        );

        if !(0..=MAX_VIP_BONUS).contains(&self.vip_bonus) {
            violations.push(FieldViolation::new(
                "vip_bonus",
                format!(
                    "must be between 0 and {MAX_VIP_BONUS} (found {})",
                    self.vip_bonus
                ),
            ));
        }

        for (field, value) in [
            ("multipliers.low", self.multipliers.low),
            ("multipliers.medium", self.multipliers.medium),
            ("multipliers.high", self.multipliers.high),
            ("multipliers.critical", self.multipliers.critical),
        ] {
            if !value.is_finite() || value <= 0.0 || value > MAX_MULTIPLIER {
                violations.push(FieldViolation::new(
                    field,
                    format!("must be greater than 0 and at most {MAX_MULTIPLIER} (found {value})"),
                ));
            }
        }

        if self.billing_reference == 0 {
            violations.push(FieldViolation::new(
                "billing_reference",
                "must be greater than 0",
            ));
        }

        violations
    }

    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            (
                "weights.deadline_urgency",
                self.weights.deadline_urgency.to_string(),
            ),
            ("weights.billing_value", self.weights.billing_value.to_string()),
            ("weights.time_open", self.weights.time_open.to_string()),
            (
                "weights.stack_complexity",
                self.weights.stack_complexity.to_string(),
            ),
            ("vip_bonus", self.vip_bonus.to_string()),
            ("multipliers.low", format!("{:.2}", self.multipliers.low)),
            ("multipliers.medium", format!("{:.2}", self.multipliers.medium)),
            ("multipliers.high", format!("{:.2}", self.multipliers.high)),
            (
                "multipliers.critical",
                format!("{:.2}", self.multipliers.critical),
            ),
            ("billing_reference", self.billing_reference.to_string()),
        ]
    }
}
