use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    AllocationDecision, AnalystId, AnalystScore, DecisionType, JobId, OverrideReason, UserId,
};
use super::repository::{
    AllocationNotice, AnalystDirectory, ConfigurationRepository, DecisionDraft, DecisionLog,
    JobDirectory, JustificationProvider, NotificationDispatcher, ProviderError, RepositoryError,
};
use super::scoring::ScoringEngine;
use super::weighting::{
    ConfigurationStore, DistributionConfig, FieldViolation, WeightingError,
};

/// Knobs for the ranking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingSettings {
    /// Upper bound for each call to the justification provider.
    pub provider_timeout: Duration,
    /// How many top analysts form the suggestion.
    pub suggestion_size: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_millis(1500),
            suggestion_size: 3,
        }
    }
}

/// Ordered ranking for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingOutcome {
    pub job_id: JobId,
    /// `None` when no configuration was active and built-in defaults were used.
    pub config_version: Option<u32>,
    pub scores: Vec<AnalystScore>,
    pub suggested: Vec<AnalystId>,
    /// True when AI justifications were skipped after a provider failure or timeout.
    pub degraded: bool,
}

impl RankingOutcome {
    pub fn top(&self, n: usize) -> Vec<AnalystId> {
        self.scores
            .iter()
            .take(n)
            .map(|score| score.analyst_id)
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error(transparent)]
    Weighting(#[from] WeightingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Operator decision as submitted from the confirmation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub job_id: JobId,
    pub suggested: Vec<AnalystId>,
    pub chosen: Vec<AnalystId>,
    pub actor: UserId,
    #[serde(default)]
    pub justification: Option<String>,
    /// Reason code such as `balanceamento_carga`.
    #[serde(default)]
    pub override_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("decision rejected: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation(Vec<FieldViolation>),
    #[error("manual override requires {field}")]
    MissingJustification { field: &'static str },
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Sort descending by total; equal totals favour the lighter load, then the lower analyst id.
pub fn rank_scores(scores: &mut [AnalystScore]) {
    scores.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.current_load.cmp(&b.current_load))
            .then_with(|| a.analyst_id.cmp(&b.analyst_id))
    });
}

/// Whether `chosen` departs from the first `chosen.len()` suggested analysts. Order-insensitive.
pub fn is_override(suggested: &[AnalystId], chosen: &[AnalystId]) -> bool {
    let chosen: BTreeSet<AnalystId> = chosen.iter().copied().collect();

    let mut seen = BTreeSet::new();
    let top: BTreeSet<AnalystId> = suggested
        .iter()
        .copied()
        .filter(|analyst| seen.insert(*analyst))
        .take(chosen.len())
        .collect();

    top != chosen
}

/// Ranks analysts for a job and records the operator's decision.
pub struct RankingService<S, N> {
    store: Arc<S>,
    weighting: ConfigurationStore<S>,
    notifier: Arc<N>,
    justifier: Arc<dyn JustificationProvider>,
    settings: RankingSettings,
}

impl<S, N> RankingService<S, N>
where
    S: AnalystDirectory + JobDirectory + DecisionLog + ConfigurationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        justifier: Arc<dyn JustificationProvider>,
        settings: RankingSettings,
    ) -> Self {
        let weighting = ConfigurationStore::new(store.clone());
        Self {
            store,
            weighting,
            notifier,
            justifier,
            settings,
        }
    }

    pub fn settings(&self) -> RankingSettings {
        self.settings
    }

    fn distribution_config(&self) -> Result<(Option<u32>, DistributionConfig), RankingError> {
        match self.weighting.active_distribution() {
            Ok((version, config)) => Ok((Some(version), config)),
            Err(WeightingError::NotFound(kind)) => {
                warn!(%kind, "no active configuration; ranking with built-in defaults");
                Ok((None, DistributionConfig::default()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read-only: dropping the future mid-flight leaves nothing behind.
    pub async fn rank(&self, job_id: JobId) -> Result<RankingOutcome, RankingError> {
        let job = self
            .store
            .job(job_id)?
            .ok_or(RankingError::JobNotFound(job_id))?;
        let (config_version, config) = self.distribution_config()?;
        let analysts = self.store.analysts()?;

        let engine = ScoringEngine::new(config);
        let mut scores = engine.score_all(&job, &analysts);
        rank_scores(&mut scores);

        let suggestion_size = self.settings.suggestion_size.max(1);
        let mut degraded = false;
        for score in scores.iter_mut().take(suggestion_size) {
            let call = self.justifier.justify(&job, score);
            let result = match tokio::time::timeout(self.settings.provider_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(
                    self.settings.provider_timeout.as_millis() as u64,
                )),
            };

            match result {
                Ok(summary) => {
                    score.ai_summary = summary
                        .map(|text| text.trim().to_string())
                        .filter(|text| !text.is_empty());
                }
                Err(err) => {
                    warn!(
                        %job_id,
                        analyst_id = %score.analyst_id,
                        error = %err,
                        "justification provider failed; continuing with configuration-only ranking"
                    );
                    degraded = true;
                    break;
                }
            }
        }

        let suggested = scores
            .iter()
            .take(suggestion_size)
            .map(|score| score.analyst_id)
            .collect();

        Ok(RankingOutcome {
            job_id,
            config_version,
            scores,
            suggested,
            degraded,
        })
    }

    /// Validate and append a decision. Never touches job assignments.
    pub fn record_decision(
        &self,
        request: DecisionRequest,
    ) -> Result<AllocationDecision, DecisionError> {
        let DecisionRequest {
            job_id,
            suggested,
            chosen,
            actor,
            justification,
            override_reason,
        } = request;

        let mut violations = Vec::new();
        if chosen.is_empty() {
            violations.push(FieldViolation::new(
                "chosen",
                "select at least one analyst",
            ));
        }
        let reason = match override_reason
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        {
            None => None,
            Some(code) => match OverrideReason::from_code(code) {
                Some(reason) => Some(reason),
                None => {
                    violations.push(FieldViolation::new(
                        "override_reason",
                        format!("unknown override reason code '{code}'"),
                    ));
                    None
                }
            },
        };
        if !violations.is_empty() {
            return Err(DecisionError::Validation(violations));
        }

        let justification = justification
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        let overridden = is_override(&suggested, &chosen);

        if overridden && reason.is_none() {
            return Err(DecisionError::MissingJustification {
                field: "override_reason",
            });
        }
        if reason == Some(OverrideReason::Other) && justification.is_none() {
            return Err(DecisionError::MissingJustification {
                field: "justification",
            });
        }

        if self.store.job(job_id)?.is_none() {
            return Err(DecisionError::JobNotFound(job_id));
        }

        let mut seen = BTreeSet::new();
        let chosen: Vec<AnalystId> = chosen
            .into_iter()
            .filter(|analyst| seen.insert(*analyst))
            .collect();
        let decision_type = if overridden {
            DecisionType::ManualOverride
        } else {
            DecisionType::AiAccepted
        };

        let decision = self.store.append_decision(DecisionDraft {
            job_id,
            suggested,
            chosen,
            decision_type,
            justification,
            override_reason: reason,
            decided_at: Utc::now(),
            decided_by: actor,
        })?;

        info!(
            %job_id,
            decision_id = %decision.id,
            decision_type = decision.decision_type.label(),
            reason = decision.override_reason.map(OverrideReason::code),
            "allocation decision recorded"
        );

        let notice = AllocationNotice::DecisionRecorded {
            job_id,
            decision_id: decision.id,
            decision_type,
        };
        if let Err(err) = self.notifier.dispatch(notice) {
            warn!(%job_id, error = %err, "decision notification failed");
        }

        Ok(decision)
    }

    pub fn decisions(&self, job_id: JobId) -> Result<Vec<AllocationDecision>, DecisionError> {
        Ok(self.store.decisions(job_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[u64]) -> Vec<AnalystId> {
        values.iter().copied().map(AnalystId).collect()
    }

    #[test]
    fn same_set_in_another_order_is_not_an_override() {
        assert!(!is_override(&ids(&[3, 7, 9]), &ids(&[7, 3])));
    }

    #[test]
    fn different_member_is_an_override() {
        assert!(is_override(&ids(&[3, 7, 9]), &ids(&[3, 9])));
    }

    #[test]
    fn choosing_more_than_suggested_is_an_override() {
        assert!(is_override(&ids(&[3]), &ids(&[3, 7])));
    }

    #[test]
    fn duplicate_picks_collapse_before_comparison() {
        assert!(!is_override(&ids(&[3, 7]), &ids(&[3, 3])));
    }
}
