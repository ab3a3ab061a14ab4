use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::distribution::JobLedger;
use super::domain::{
    AllocationDecision, AnalystId, AnalystProfile, AnalystScore, CandidateId, DecisionId,
    DecisionType, JobId, JobSnapshot, OverrideReason, UserId,
};
use super::weighting::{ConfigChange, ConfigKind, StoredConfig};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Versioned weighting configurations and their change history.
pub trait ConfigurationRepository: Send + Sync {
    fn active_config(&self, kind: ConfigKind) -> Result<Option<StoredConfig>, RepositoryError>;

    /// Store `config` as the single active row of its kind, superseding the current one, and
    /// append `changes` in the same step. Fails with `Conflict` when the active version is no
    /// longer `expected_active`.
    fn activate_config(
        &self,
        expected_active: Option<u32>,
        config: StoredConfig,
        changes: Vec<ConfigChange>,
    ) -> Result<StoredConfig, RepositoryError>;

    fn config_versions(&self, kind: ConfigKind) -> Result<Vec<StoredConfig>, RepositoryError>;

    /// Most recent entries first.
    fn config_history(
        &self,
        kind: ConfigKind,
        limit: usize,
    ) -> Result<Vec<ConfigChange>, RepositoryError>;
}

/// Decision payload before the log assigns its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionDraft {
    pub job_id: JobId,
    pub suggested: Vec<AnalystId>,
    pub chosen: Vec<AnalystId>,
    pub decision_type: DecisionType,
    pub justification: Option<String>,
    pub override_reason: Option<OverrideReason>,
    pub decided_at: DateTime<Utc>,
    pub decided_by: UserId,
}

/// Append-only audit log of ranking decisions.
pub trait DecisionLog: Send + Sync {
    fn append_decision(&self, draft: DecisionDraft)
        -> Result<AllocationDecision, RepositoryError>;
    fn decisions(&self, job_id: JobId) -> Result<Vec<AllocationDecision>, RepositoryError>;
}

/// Per-job distribution state with transactional updates.
pub trait AssignmentRepository: Send + Sync {
    /// Consistent snapshot of a job's ledger; unknown jobs yield an empty ledger.
    fn ledger(&self, job_id: JobId) -> Result<JobLedger, RepositoryError>;

    /// Run `apply` against the job's ledger with every other writer of that job excluded.
    /// Changes become visible only when `apply` returns `Ok`.
    fn transact<T, E, F>(&self, job_id: JobId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut JobLedger) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Read-only analyst profile and performance provider.
///
/// `active_candidates` must include the candidates currently routed to the analyst by the
/// distributor, so ranking sees live load.
pub trait AnalystDirectory: Send + Sync {
    fn analysts(&self) -> Result<Vec<AnalystProfile>, RepositoryError>;
    fn analyst(&self, id: AnalystId) -> Result<Option<AnalystProfile>, RepositoryError>;
}

/// Read-only job requisition provider.
pub trait JobDirectory: Send + Sync {
    fn job(&self, id: JobId) -> Result<Option<JobSnapshot>, RepositoryError>;
    fn open_jobs(&self) -> Result<Vec<JobSnapshot>, RepositoryError>;
}

/// Everything the allocation service needs from persistence.
pub trait AllocationStore:
    ConfigurationRepository + DecisionLog + AssignmentRepository + AnalystDirectory + JobDirectory
{
}

impl<T> AllocationStore for T where
    T: ConfigurationRepository
        + DecisionLog
        + AssignmentRepository
        + AnalystDirectory
        + JobDirectory
{
}

/// Advisory text source for ranked analysts (typically an LLM adapter).
#[async_trait]
pub trait JustificationProvider: Send + Sync {
    async fn justify(
        &self,
        job: &JobSnapshot,
        score: &AnalystScore,
    ) -> Result<Option<String>, ProviderError>;
}

/// Provider used when no AI backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJustification;

#[async_trait]
impl JustificationProvider for NoJustification {
    async fn justify(
        &self,
        _job: &JobSnapshot,
        _score: &AnalystScore,
    ) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("justification provider unavailable: {0}")]
    Unavailable(String),
    #[error("justification provider timed out after {0} ms")]
    Timeout(u64),
}

/// Fire-and-forget hook for e-mail or chat adapters.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notice: AllocationNotice) -> Result<(), NotifyError>;
}

/// Payload describing something operators may want to hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationNotice {
    DecisionRecorded {
        job_id: JobId,
        decision_id: DecisionId,
        decision_type: DecisionType,
    },
    Redistributed {
        job_id: JobId,
        from_analyst: AnalystId,
        moved: Vec<(CandidateId, AnalystId)>,
    },
    CandidateQueued {
        job_id: JobId,
        candidate_id: CandidateId,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
