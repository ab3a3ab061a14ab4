mod rules;
mod urgency;

pub use urgency::{prioritize, JobPriority};

use super::domain::{AnalystProfile, AnalystScore, JobSnapshot};
use super::weighting::DistributionConfig;

/// Compatibility of `analyst` with `job` under `config`. Pure: equal inputs give equal scores.
pub fn score(
    job: &JobSnapshot,
    analyst: &AnalystProfile,
    config: &DistributionConfig,
) -> AnalystScore {
    rules::score_analyst(job, analyst, config)
}

/// Stateless scorer bound to one distribution configuration.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: DistributionConfig,
}

impl ScoringEngine {
    pub fn new(config: DistributionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    pub fn score(&self, job: &JobSnapshot, analyst: &AnalystProfile) -> AnalystScore {
        score(job, analyst, &self.config)
    }

    pub fn score_all(&self, job: &JobSnapshot, analysts: &[AnalystProfile]) -> Vec<AnalystScore> {
        analysts
            .iter()
            .map(|analyst| self.score(job, analyst))
            .collect()
    }
}

#[cfg(test)]
pub(crate) use rules::{
    availability_factor, points, APPROVAL_CAP, CLIENT_FIT_CAP, LOAD_CAP, NEUTRAL_APPROVAL_POINTS,
    NEUTRAL_SPEED_POINTS, SPECIALIZATION_CAP, SPEED_CAP,
};
