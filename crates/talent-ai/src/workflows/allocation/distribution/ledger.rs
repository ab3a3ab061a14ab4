use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::DistributionError;
use crate::workflows::allocation::domain::{
    AnalystId, AssignmentId, AssignmentKind, CandidateAssignmentEvent, CandidateId, EventId,
    JobAnalystAssignment, JobId, QueuedCandidate, UserId,
};

pub(crate) const REMOVED_REASON: &str = "analyst removed";
pub(crate) const CAPACITY_RELEASED_REASON: &str = "capacity released";
pub(crate) const CAPACITY_EXHAUSTED_REASON: &str = "no active analyst with free capacity";

/// Distribution state of a single job: attached analysts, routing history, and the queue of
/// candidates waiting for capacity.
///
/// Events are never rewritten. `current` points every routed candidate at its latest event, and
/// each assignment's `assigned_count` equals the number of pointers that land on it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobLedger {
    job_id: JobId,
    assignments: Vec<JobAnalystAssignment>,
    events: Vec<CandidateAssignmentEvent>,
    current: BTreeMap<CandidateId, EventId>,
    queue: Vec<QueuedCandidate>,
    next_assignment: u64,
    next_event: u64,
}

/// Result of routing one candidate application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoutingOutcome {
    Assigned { event: CandidateAssignmentEvent },
    Queued { candidate_id: CandidateId, reason: String },
}

/// Mutable state of a ledger captured before a transaction. The event log is append-only, so
/// only its length is kept.
#[derive(Debug, Clone)]
pub struct LedgerCheckpoint {
    assignments: Vec<JobAnalystAssignment>,
    current: BTreeMap<CandidateId, EventId>,
    queue: Vec<QueuedCandidate>,
    next_assignment: u64,
    next_event: u64,
    events_len: usize,
}

/// What happened to a removed analyst's backlog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovalReport {
    pub assignment: JobAnalystAssignment,
    pub redistributed: Vec<CandidateAssignmentEvent>,
    pub queued: Vec<CandidateId>,
}

impl JobLedger {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            assignments: Vec::new(),
            events: Vec::new(),
            current: BTreeMap::new(),
            queue: Vec::new(),
            next_assignment: 1,
            next_event: 1,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Attached assignments (active or paused) in alternation order.
    pub fn assignments(&self) -> Vec<JobAnalystAssignment> {
        let mut attached: Vec<JobAnalystAssignment> = self
            .assignments
            .iter()
            .filter(|assignment| assignment.is_attached())
            .cloned()
            .collect();
        attached.sort_by_key(|assignment| (assignment.alternation_order, assignment.id));
        attached
    }

    /// Every row ever created, soft-deleted ones included.
    pub fn all_assignments(&self) -> &[JobAnalystAssignment] {
        &self.assignments
    }

    pub fn events(&self) -> &[CandidateAssignmentEvent] {
        &self.events
    }

    pub fn queue(&self) -> &[QueuedCandidate] {
        &self.queue
    }

    pub fn attached(&self, analyst_id: AnalystId) -> Option<&JobAnalystAssignment> {
        self.assignments
            .iter()
            .find(|assignment| assignment.analyst_id == analyst_id && assignment.is_attached())
    }

    /// Current analyst of a routed candidate.
    pub fn analyst_for(&self, candidate_id: CandidateId) -> Option<AnalystId> {
        self.current_event(candidate_id).map(|event| event.analyst_id)
    }

    /// Candidates currently pointing at `assignment_id`.
    pub fn candidates_of(&self, assignment_id: AssignmentId) -> Vec<CandidateId> {
        self.current
            .iter()
            .filter(|(_, event_id)| {
                self.event(**event_id)
                    .is_some_and(|event| event.assignment_id == assignment_id)
            })
            .map(|(candidate_id, _)| *candidate_id)
            .collect()
    }

    pub fn active_candidate_total(&self) -> usize {
        self.current.len()
    }

    /// Counter invariant: every row's `assigned_count` matches the pointers landing on it and no
    /// pointer lands on a removed row.
    pub fn is_consistent(&self) -> bool {
        let mut pointing: BTreeMap<AssignmentId, u32> = BTreeMap::new();
        for event_id in self.current.values() {
            match self.event(*event_id) {
                Some(event) => *pointing.entry(event.assignment_id).or_insert(0) += 1,
                None => return false,
            }
        }

        self.assignments.iter().all(|assignment| {
            let pointing = pointing.get(&assignment.id).copied().unwrap_or(0);
            pointing == assignment.assigned_count && (assignment.is_attached() || pointing == 0)
        })
    }

    /// Capture everything a failed transaction may have touched.
    pub fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            assignments: self.assignments.clone(),
            current: self.current.clone(),
            queue: self.queue.clone(),
            next_assignment: self.next_assignment,
            next_event: self.next_event,
            events_len: self.events.len(),
        }
    }

    /// Return to `checkpoint`, dropping events appended since it was taken.
    pub fn rollback(&mut self, checkpoint: LedgerCheckpoint) {
        self.assignments = checkpoint.assignments;
        self.current = checkpoint.current;
        self.queue = checkpoint.queue;
        self.next_assignment = checkpoint.next_assignment;
        self.next_event = checkpoint.next_event;
        self.events.truncate(checkpoint.events_len);
    }

    pub(crate) fn add_analyst(
        &mut self,
        analyst_id: AnalystId,
        max_candidates: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<JobAnalystAssignment, DistributionError> {
        if max_candidates == Some(0) {
            return Err(DistributionError::InvalidCapacity);
        }
        if self.attached(analyst_id).is_some() {
            return Err(DistributionError::AlreadyAssigned {
                job_id: self.job_id,
                analyst_id,
            });
        }

        let alternation_order = self
            .assignments
            .iter()
            .filter(|assignment| assignment.is_attached())
            .map(|assignment| assignment.alternation_order)
            .max()
            .unwrap_or(0)
            + 1;

        let assignment = JobAnalystAssignment {
            id: AssignmentId(self.next_assignment),
            job_id: self.job_id,
            analyst_id,
            active: true,
            alternation_order,
            max_candidates,
            assigned_count: 0,
            distribution_percentage: 0.0,
            created_at: now,
            removed_at: None,
        };
        self.next_assignment += 1;
        self.assignments.push(assignment.clone());
        self.recompute_percentages();
        Ok(assignment)
    }

    pub(crate) fn set_active(
        &mut self,
        assignment_id: AssignmentId,
        active: bool,
    ) -> Result<JobAnalystAssignment, DistributionError> {
        let job_id = self.job_id;
        let assignment = self
            .assignments
            .iter_mut()
            .find(|assignment| assignment.id == assignment_id && assignment.is_attached())
            .ok_or(DistributionError::AssignmentNotFound {
                job_id,
                assignment_id,
            })?;
        assignment.active = active;
        Ok(assignment.clone())
    }

    /// Least-loaded eligible assignment, ties broken by alternation order.
    fn pick_next(&self) -> Option<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, assignment)| assignment.accepts_candidates())
            .min_by_key(|(_, assignment)| {
                (
                    assignment.assigned_count,
                    assignment.alternation_order,
                    assignment.id,
                )
            })
            .map(|(index, _)| index)
    }

    /// Event ids are dense per job and start at 1.
    fn event(&self, event_id: EventId) -> Option<&CandidateAssignmentEvent> {
        let index = usize::try_from(event_id.0.checked_sub(1)?).ok()?;
        self.events.get(index).filter(|event| event.id == event_id)
    }

    fn current_event(&self, candidate_id: CandidateId) -> Option<&CandidateAssignmentEvent> {
        self.event(*self.current.get(&candidate_id)?)
    }

    fn dequeue(&mut self, candidate_id: CandidateId) -> Option<QueuedCandidate> {
        let position = self
            .queue
            .iter()
            .position(|queued| queued.candidate_id == candidate_id)?;
        Some(self.queue.remove(position))
    }

    fn enqueue(
        &mut self,
        candidate_id: CandidateId,
        reason: &str,
        previous_analyst: Option<AnalystId>,
        now: DateTime<Utc>,
    ) {
        if self
            .queue
            .iter()
            .any(|queued| queued.candidate_id == candidate_id)
        {
            return;
        }
        self.queue.push(QueuedCandidate {
            candidate_id,
            reason: reason.to_string(),
            previous_analyst,
            queued_at: now,
        });
    }

    /// Detach a candidate from its current assignment, returning the analyst it left.
    fn unlink(&mut self, candidate_id: CandidateId) -> Option<AnalystId> {
        let event_id = self.current.remove(&candidate_id)?;
        let (assignment_id, analyst_id) = self
            .event(event_id)
            .map(|event| (event.assignment_id, event.analyst_id))?;

        if let Some(assignment) = self
            .assignments
            .iter_mut()
            .find(|assignment| assignment.id == assignment_id)
        {
            assignment.assigned_count = assignment.assigned_count.saturating_sub(1);
        }
        Some(analyst_id)
    }

    #[allow(clippy::too_many_arguments)]
    fn assign_at(
        &mut self,
        index: usize,
        candidate_id: CandidateId,
        kind: AssignmentKind,
        previous_analyst: Option<AnalystId>,
        reason: Option<String>,
        assigned_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> CandidateAssignmentEvent {
        let assignment = &mut self.assignments[index];
        assignment.assigned_count += 1;

        let event = CandidateAssignmentEvent {
            id: EventId(self.next_event),
            job_id: self.job_id,
            candidate_id,
            assignment_id: assignment.id,
            analyst_id: assignment.analyst_id,
            kind,
            previous_analyst,
            reason,
            assigned_by,
            assigned_at: now,
        };
        self.next_event += 1;
        self.current.insert(candidate_id, event.id);
        self.events.push(event.clone());
        event
    }

    /// Route a new candidate application to the least-loaded eligible analyst, or queue it.
    pub(crate) fn route(
        &mut self,
        candidate_id: CandidateId,
        now: DateTime<Utc>,
    ) -> Result<RoutingOutcome, DistributionError> {
        if self.current.contains_key(&candidate_id) {
            return Err(DistributionError::CandidateAlreadyRouted {
                job_id: self.job_id,
                candidate_id,
            });
        }

        match self.pick_next() {
            Some(index) => {
                let previous = self.dequeue(candidate_id);
                let event = self.assign_at(
                    index,
                    candidate_id,
                    AssignmentKind::Automatic,
                    previous.as_ref().and_then(|queued| queued.previous_analyst),
                    None,
                    None,
                    now,
                );
                self.recompute_percentages();
                Ok(RoutingOutcome::Assigned { event })
            }
            None => {
                self.enqueue(candidate_id, CAPACITY_EXHAUSTED_REASON, None, now);
                Ok(RoutingOutcome::Queued {
                    candidate_id,
                    reason: CAPACITY_EXHAUSTED_REASON.to_string(),
                })
            }
        }
    }

    /// Operator-driven placement: skips eligibility and capacity checks but keeps counters exact.
    pub(crate) fn assign_manually(
        &mut self,
        candidate_id: CandidateId,
        analyst_id: AnalystId,
        actor: &UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CandidateAssignmentEvent, DistributionError> {
        let job_id = self.job_id;
        let index = self
            .assignments
            .iter()
            .position(|assignment| assignment.analyst_id == analyst_id && assignment.is_attached())
            .ok_or(DistributionError::AnalystNotAssigned { job_id, analyst_id })?;

        if self.analyst_for(candidate_id) == Some(analyst_id) {
            return Err(DistributionError::CandidateAlreadyRouted {
                job_id,
                candidate_id,
            });
        }

        let queued = self.dequeue(candidate_id);
        let previous = self
            .unlink(candidate_id)
            .or_else(|| queued.and_then(|entry| entry.previous_analyst));
        let event = self.assign_at(
            index,
            candidate_id,
            AssignmentKind::Manual,
            previous,
            reason,
            Some(actor.clone()),
            now,
        );
        self.recompute_percentages();
        Ok(event)
    }

    /// Candidate left the pipeline; frees a slot on its analyst.
    pub(crate) fn release(
        &mut self,
        candidate_id: CandidateId,
    ) -> Result<Option<AnalystId>, DistributionError> {
        if let Some(analyst_id) = self.unlink(candidate_id) {
            self.recompute_percentages();
            return Ok(Some(analyst_id));
        }
        if self.dequeue(candidate_id).is_some() {
            return Ok(None);
        }
        Err(DistributionError::CandidateNotFound {
            job_id: self.job_id,
            candidate_id,
        })
    }

    /// Soft-delete an analyst's assignment. With `redistribute`, every candidate of the analyst
    /// is re-routed to the remaining analysts and a single unplaceable candidate fails the whole
    /// removal; without it, the backlog moves to the job queue.
    pub(crate) fn remove_analyst(
        &mut self,
        analyst_id: AnalystId,
        redistribute: bool,
        actor: &UserId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RemovalReport, DistributionError> {
        let job_id = self.job_id;
        let index = self
            .assignments
            .iter()
            .position(|assignment| assignment.analyst_id == analyst_id && assignment.is_attached())
            .ok_or(DistributionError::AnalystNotAssigned { job_id, analyst_id })?;
        let assignment_id = self.assignments[index].id;

        // Out of the eligible set before any backlog is replayed.
        self.assignments[index].active = false;

        let mut orphans: Vec<(EventId, CandidateId)> = self
            .current
            .iter()
            .filter(|(_, event_id)| {
                self.event(**event_id)
                    .is_some_and(|event| event.assignment_id == assignment_id)
            })
            .map(|(candidate_id, event_id)| (*event_id, *candidate_id))
            .collect();
        orphans.sort();

        let reason = reason
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(REMOVED_REASON)
            .to_string();

        let mut redistributed = Vec::new();
        let mut queued = Vec::new();
        let total = orphans.len();
        for (position, (_, candidate_id)) in orphans.into_iter().enumerate() {
            self.unlink(candidate_id);
            if redistribute {
                let target = self
                    .pick_next()
                    .ok_or(DistributionError::CapacityExhausted {
                        job_id,
                        unplaced: total - position,
                    })?;
                redistributed.push(self.assign_at(
                    target,
                    candidate_id,
                    AssignmentKind::Redistribution,
                    Some(analyst_id),
                    Some(reason.clone()),
                    Some(actor.clone()),
                    now,
                ));
            } else {
                self.enqueue(candidate_id, &reason, Some(analyst_id), now);
                queued.push(candidate_id);
            }
        }

        let removed = &mut self.assignments[index];
        removed.removed_at = Some(now);
        removed.assigned_count = 0;
        removed.distribution_percentage = 0.0;
        let assignment = removed.clone();
        self.recompute_percentages();

        Ok(RemovalReport {
            assignment,
            redistributed,
            queued,
        })
    }

    /// Route queued candidates, oldest first, while any analyst has room.
    pub(crate) fn drain_queue(&mut self, now: DateTime<Utc>) -> Vec<CandidateAssignmentEvent> {
        let mut placed = Vec::new();
        while !self.queue.is_empty() {
            let Some(index) = self.pick_next() else {
                break;
            };
            let queued = self.queue.remove(0);
            placed.push(self.assign_at(
                index,
                queued.candidate_id,
                AssignmentKind::Automatic,
                queued.previous_analyst,
                Some(CAPACITY_RELEASED_REASON.to_string()),
                None,
                now,
            ));
        }
        if !placed.is_empty() {
            self.recompute_percentages();
        }
        placed
    }

    fn recompute_percentages(&mut self) {
        let total: u32 = self
            .assignments
            .iter()
            .filter(|assignment| assignment.is_attached())
            .map(|assignment| assignment.assigned_count)
            .sum();

        for assignment in self.assignments.iter_mut() {
            assignment.distribution_percentage = if total == 0 || !assignment.is_attached() {
                0.0
            } else {
                let share = f64::from(assignment.assigned_count) / f64::from(total) * 100.0;
                (share * 100.0).round() / 100.0
            };
        }
    }
}
