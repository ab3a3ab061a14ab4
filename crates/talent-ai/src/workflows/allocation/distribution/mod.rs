//! Capacity-aware round-robin distribution of candidate applications across a job's analysts.

mod ledger;

pub use ledger::{JobLedger, LedgerCheckpoint, RemovalReport, RoutingOutcome};

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    AllocationDecision, AnalystId, AssignmentId, CandidateAssignmentEvent, CandidateId,
    JobAnalystAssignment, JobId, QueuedCandidate, UserId,
};
use super::repository::{
    AllocationNotice, AnalystDirectory, AssignmentRepository, JobDirectory,
    NotificationDispatcher, RepositoryError,
};

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("analyst {analyst_id} is already assigned to job {job_id}")]
    AlreadyAssigned { job_id: JobId, analyst_id: AnalystId },
    #[error("analyst {analyst_id} is not assigned to job {job_id}")]
    AnalystNotAssigned { job_id: JobId, analyst_id: AnalystId },
    #[error("assignment {assignment_id} not found on job {job_id}")]
    AssignmentNotFound {
        job_id: JobId,
        assignment_id: AssignmentId,
    },
    #[error("candidate {candidate_id} is already routed on job {job_id}")]
    CandidateAlreadyRouted {
        job_id: JobId,
        candidate_id: CandidateId,
    },
    #[error("candidate {candidate_id} is not active on job {job_id}")]
    CandidateNotFound {
        job_id: JobId,
        candidate_id: CandidateId,
    },
    #[error("capacity exhausted on job {job_id}: {unplaced} candidate(s) could not be placed")]
    CapacityExhausted { job_id: JobId, unplaced: usize },
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("max candidates must be at least 1 when set")]
    InvalidCapacity,
    #[error("unknown analyst {0}")]
    UnknownAnalyst(AnalystId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of releasing a candidate from a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseOutcome {
    pub candidate_id: CandidateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_from: Option<AnalystId>,
    /// Queued candidates that took the freed capacity.
    pub drained: Vec<CandidateAssignmentEvent>,
}

/// Distribution state store plus round-robin router.
pub struct DistributionService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S, N> Clone for DistributionService<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S, N> DistributionService<S, N>
where
    S: AssignmentRepository + AnalystDirectory + JobDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    fn notify(&self, notice: AllocationNotice) {
        if let Err(err) = self.notifier.dispatch(notice) {
            warn!(error = %err, "allocation notification failed");
        }
    }

    fn ensure_job(&self, job_id: JobId) -> Result<(), DistributionError> {
        match self.store.job(job_id)? {
            Some(_) => Ok(()),
            None => Err(DistributionError::JobNotFound(job_id)),
        }
    }

    fn ensure_known(&self, analyst_id: AnalystId) -> Result<(), DistributionError> {
        match self.store.analyst(analyst_id)? {
            Some(_) => Ok(()),
            None => Err(DistributionError::UnknownAnalyst(analyst_id)),
        }
    }

    pub fn add_analyst(
        &self,
        job_id: JobId,
        analyst_id: AnalystId,
        max_candidates: Option<u32>,
    ) -> Result<JobAnalystAssignment, DistributionError> {
        self.ensure_job(job_id)?;
        self.ensure_known(analyst_id)?;
        let now = Utc::now();

        let (assignment, drained) = self.store.transact(job_id, |ledger| {
            let assignment = ledger.add_analyst(analyst_id, max_candidates, now)?;
            let drained = ledger.drain_queue(now);
            let assignment = ledger
                .attached(analyst_id)
                .cloned()
                .unwrap_or(assignment);
            Ok::<_, DistributionError>((assignment, drained))
        })?;

        info!(
            %job_id,
            %analyst_id,
            assignment_id = %assignment.id,
            drained = drained.len(),
            "analyst attached to job"
        );
        Ok(assignment)
    }

    /// Attach every chosen analyst of a confirmed decision that is not attached yet.
    pub fn apply_decision(
        &self,
        decision: &AllocationDecision,
        max_candidates: Option<u32>,
    ) -> Result<Vec<JobAnalystAssignment>, DistributionError> {
        self.ensure_job(decision.job_id)?;
        for analyst_id in &decision.chosen {
            self.ensure_known(*analyst_id)?;
        }
        let now = Utc::now();

        let attached = self.store.transact(decision.job_id, |ledger| {
            let mut attached = Vec::new();
            for analyst_id in &decision.chosen {
                if ledger.attached(*analyst_id).is_some() {
                    continue;
                }
                attached.push(ledger.add_analyst(*analyst_id, max_candidates, now)?);
            }
            ledger.drain_queue(now);
            Ok::<_, DistributionError>(attached)
        })?;

        info!(
            job_id = %decision.job_id,
            decision_id = %decision.id,
            attached = attached.len(),
            "decision applied to distribution"
        );
        Ok(attached)
    }

    /// Soft-delete an analyst from a job. Redistribution and removal commit together or not at
    /// all.
    pub fn remove_analyst(
        &self,
        job_id: JobId,
        analyst_id: AnalystId,
        redistribute: bool,
        actor: &UserId,
        reason: Option<&str>,
    ) -> Result<RemovalReport, DistributionError> {
        self.ensure_job(job_id)?;
        let now = Utc::now();
        let result = self.store.transact(job_id, |ledger| {
            ledger.remove_analyst(analyst_id, redistribute, actor, reason, now)
        });

        let report = match result {
            Ok(report) => report,
            Err(err @ DistributionError::CapacityExhausted { .. }) => {
                warn!(%job_id, %analyst_id, error = %err, "analyst removal rejected");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        info!(
            %job_id,
            %analyst_id,
            redistributed = report.redistributed.len(),
            queued = report.queued.len(),
            actor = %actor,
            "analyst removed from job"
        );

        if !report.redistributed.is_empty() {
            self.notify(AllocationNotice::Redistributed {
                job_id,
                from_analyst: analyst_id,
                moved: report
                    .redistributed
                    .iter()
                    .map(|event| (event.candidate_id, event.analyst_id))
                    .collect(),
            });
        }
        for candidate_id in &report.queued {
            self.notify(AllocationNotice::CandidateQueued {
                job_id,
                candidate_id: *candidate_id,
                reason: ledger::REMOVED_REASON.to_string(),
            });
        }

        Ok(report)
    }

    /// Pause or resume an analyst. Pausing leaves the existing backlog untouched.
    pub fn toggle_active(
        &self,
        job_id: JobId,
        assignment_id: AssignmentId,
        active: bool,
    ) -> Result<JobAnalystAssignment, DistributionError> {
        self.ensure_job(job_id)?;
        let now = Utc::now();
        let assignment = self.store.transact(job_id, |ledger| {
            let assignment = ledger.set_active(assignment_id, active)?;
            if active {
                ledger.drain_queue(now);
            }
            Ok::<_, DistributionError>(
                ledger
                    .attached(assignment.analyst_id)
                    .cloned()
                    .unwrap_or(assignment),
            )
        })?;

        info!(%job_id, %assignment_id, active, "assignment activation changed");
        Ok(assignment)
    }

    pub fn list_assignments(
        &self,
        job_id: JobId,
    ) -> Result<Vec<JobAnalystAssignment>, DistributionError> {
        Ok(self.ledger(job_id)?.assignments())
    }

    /// Route a new candidate application. Capacity exhaustion queues the candidate and is
    /// reported through the outcome, not as an error.
    pub fn route(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<RoutingOutcome, DistributionError> {
        self.ensure_job(job_id)?;
        let now = Utc::now();
        let outcome = self
            .store
            .transact(job_id, |ledger| ledger.route(candidate_id, now))?;

        match &outcome {
            RoutingOutcome::Assigned { event } => {
                debug!(
                    %job_id,
                    %candidate_id,
                    analyst_id = %event.analyst_id,
                    "candidate routed"
                );
            }
            RoutingOutcome::Queued { reason, .. } => {
                warn!(%job_id, %candidate_id, "capacity exhausted; candidate queued");
                self.notify(AllocationNotice::CandidateQueued {
                    job_id,
                    candidate_id,
                    reason: reason.clone(),
                });
            }
        }
        Ok(outcome)
    }

    pub fn assign_manually(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
        analyst_id: AnalystId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<CandidateAssignmentEvent, DistributionError> {
        self.ensure_job(job_id)?;
        let now = Utc::now();
        let event = self.store.transact(job_id, |ledger| {
            ledger.assign_manually(candidate_id, analyst_id, actor, reason, now)
        })?;

        info!(
            %job_id,
            %candidate_id,
            %analyst_id,
            actor = %actor,
            "candidate assigned manually"
        );
        Ok(event)
    }

    pub fn release(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<ReleaseOutcome, DistributionError> {
        self.ensure_job(job_id)?;
        let now = Utc::now();
        let outcome = self.store.transact(job_id, |ledger| {
            let released_from = ledger.release(candidate_id)?;
            let drained = ledger.drain_queue(now);
            Ok::<_, DistributionError>(ReleaseOutcome {
                candidate_id,
                released_from,
                drained,
            })
        })?;

        debug!(%job_id, %candidate_id, drained = outcome.drained.len(), "candidate released");
        Ok(outcome)
    }

    pub fn events(
        &self,
        job_id: JobId,
    ) -> Result<Vec<CandidateAssignmentEvent>, DistributionError> {
        Ok(self.ledger(job_id)?.events().to_vec())
    }

    pub fn queue(&self, job_id: JobId) -> Result<Vec<QueuedCandidate>, DistributionError> {
        Ok(self.ledger(job_id)?.queue().to_vec())
    }

    pub fn ledger(&self, job_id: JobId) -> Result<JobLedger, DistributionError> {
        self.ensure_job(job_id)?;
        Ok(self.store.ledger(job_id)?)
    }
}
