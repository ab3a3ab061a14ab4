use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::distribution::{DistributionError, DistributionService};
use super::domain::{AllocationDecision, DecisionId, JobAnalystAssignment, JobId, JobSnapshot};
use super::ranking::{
    DecisionError, DecisionRequest, RankingError, RankingOutcome, RankingService, RankingSettings,
};
use super::repository::{
    AllocationStore, JustificationProvider, NotificationDispatcher, RepositoryError,
};
use super::scoring::{prioritize, JobPriority};
use super::weighting::{ConfigurationStore, PrioritizationConfig, WeightingError};

#[derive(Debug, thiserror::Error)]
pub enum AllocationServiceError {
    #[error(transparent)]
    Weighting(#[from] WeightingError),
    #[error(transparent)]
    Ranking(#[from] RankingError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("decision {decision_id} not found on job {job_id}")]
    DecisionNotFound {
        job_id: JobId,
        decision_id: DecisionId,
    },
}

/// Recorded decision plus the assignments it created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedDecision {
    pub decision: AllocationDecision,
    pub attached: Vec<JobAnalystAssignment>,
}

/// Jobs ordered by urgency under one prioritization configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPrioritization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<u32>,
    pub today: NaiveDate,
    pub jobs: Vec<JobPriority>,
}

/// Front door of the allocation engine: configuration, ranking, decisions, and distribution over
/// one shared store.
pub struct AllocationService<S, N> {
    store: Arc<S>,
    configuration: ConfigurationStore<S>,
    ranking: RankingService<S, N>,
    distribution: DistributionService<S, N>,
}

impl<S, N> AllocationService<S, N>
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        justifier: Arc<dyn JustificationProvider>,
        settings: RankingSettings,
    ) -> Self {
        Self {
            configuration: ConfigurationStore::new(store.clone()),
            ranking: RankingService::new(store.clone(), notifier.clone(), justifier, settings),
            distribution: DistributionService::new(store.clone(), notifier),
            store,
        }
    }

    pub fn configuration(&self) -> &ConfigurationStore<S> {
        &self.configuration
    }

    pub fn ranking(&self) -> &RankingService<S, N> {
        &self.ranking
    }

    pub fn distribution(&self) -> &DistributionService<S, N> {
        &self.distribution
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn rank(&self, job_id: JobId) -> Result<RankingOutcome, AllocationServiceError> {
        Ok(self.ranking.rank(job_id).await?)
    }

    pub fn record_decision(
        &self,
        request: DecisionRequest,
    ) -> Result<AllocationDecision, AllocationServiceError> {
        Ok(self.ranking.record_decision(request)?)
    }

    /// Attach the analysts of an already recorded decision. Kept apart from recording so the
    /// audit row survives a failure here.
    pub fn apply_decision(
        &self,
        job_id: JobId,
        decision_id: DecisionId,
        max_candidates: Option<u32>,
    ) -> Result<AppliedDecision, AllocationServiceError> {
        let decision = self
            .ranking
            .decisions(job_id)?
            .into_iter()
            .find(|decision| decision.id == decision_id)
            .ok_or(AllocationServiceError::DecisionNotFound {
                job_id,
                decision_id,
            })?;

        let attached = self.distribution.apply_decision(&decision, max_candidates)?;
        Ok(AppliedDecision { decision, attached })
    }

    /// Order open jobs by urgency; an empty `job_ids` covers every open job.
    pub fn prioritize_jobs(
        &self,
        job_ids: &[JobId],
        today: NaiveDate,
    ) -> Result<JobPrioritization, AllocationServiceError> {
        let jobs: Vec<JobSnapshot> = if job_ids.is_empty() {
            self.store.open_jobs()?
        } else {
            job_ids
                .iter()
                .map(|job_id| {
                    self.store
                        .job(*job_id)?
                        .ok_or(AllocationServiceError::JobNotFound(*job_id))
                })
                .collect::<Result<_, _>>()?
        };

        let (config_version, config) = match self.configuration.active_prioritization() {
            Ok((version, config)) => (Some(version), config),
            Err(WeightingError::NotFound(_)) => (None, PrioritizationConfig::default()),
            Err(err) => return Err(err.into()),
        };

        let ranked = prioritize(&jobs, &config, today);
        info!(
            jobs = ranked.len(),
            config_version = config_version.unwrap_or(0),
            "jobs prioritized"
        );
        Ok(JobPrioritization {
            config_version,
            today,
            jobs: ranked,
        })
    }
}
