use super::common::*;
use crate::workflows::allocation::domain::{
    AnalystId, AnalystProfile, AssignmentKind, CandidateId, JobId, UserId,
};
use crate::workflows::allocation::repository::{AllocationNotice, AssignmentRepository};
use crate::workflows::allocation::{
    AllocationService, DistributionError, MemoryAllocationStore, RoutingOutcome,
};

const JOB: JobId = JobId(1);

fn operator() -> UserId {
    UserId("ops.lead".to_string())
}

fn routed_to(outcome: RoutingOutcome) -> AnalystId {
    match outcome {
        RoutingOutcome::Assigned { event } => event.analyst_id,
        RoutingOutcome::Queued { candidate_id, .. } => {
            panic!("candidate {candidate_id} was queued")
        }
    }
}

fn counts(service: &AllocationService<MemoryAllocationStore, MemoryNotifier>) -> Vec<(u64, u32)> {
    service
        .distribution()
        .list_assignments(JOB)
        .expect("assignments")
        .iter()
        .map(|assignment| (assignment.analyst_id.0, assignment.assigned_count))
        .collect()
}

fn team(size: u64) -> Vec<AnalystProfile> {
    (1..=size).map(|id| analyst(id, &format!("Analyst {id}"))).collect()
}

#[test]
fn adding_the_same_analyst_twice_is_rejected() {
    let (service, _, _) = build_service(team(2));
    let distribution = service.distribution();

    distribution.add_analyst(JOB, AnalystId(1), None).expect("first add");
    let err = distribution
        .add_analyst(JOB, AnalystId(1), Some(3))
        .expect_err("duplicate add");

    assert!(matches!(err, DistributionError::AlreadyAssigned { .. }));
    assert_eq!(counts(&service), vec![(1, 0)]);
}

#[test]
fn unknown_analysts_and_zero_capacity_are_rejected() {
    let (service, _, _) = build_service(team(1));
    let distribution = service.distribution();

    assert!(matches!(
        distribution.add_analyst(JOB, AnalystId(99), None),
        Err(DistributionError::UnknownAnalyst(AnalystId(99)))
    ));
    assert!(matches!(
        distribution.add_analyst(JOB, AnalystId(1), Some(0)),
        Err(DistributionError::InvalidCapacity)
    ));
}

#[test]
fn round_robin_keeps_counts_within_one() {
    let (service, _, _) = build_service(team(3));
    let distribution = service.distribution();
    for id in 1..=3 {
        distribution
            .add_analyst(JOB, AnalystId(id), Some(10))
            .expect("added");
    }

    for candidate in 1..=17 {
        distribution
            .route(JOB, CandidateId(candidate))
            .expect("routed");
    }

    let loads: Vec<u32> = counts(&service).into_iter().map(|(_, count)| count).collect();
    let max = loads.iter().max().copied().unwrap_or(0);
    let min = loads.iter().min().copied().unwrap_or(0);
    assert!(max - min <= 1, "uneven loads {loads:?}");
    assert_eq!(loads.iter().sum::<u32>(), 17);
}

#[test]
fn scenario_lighter_analyst_receives_the_next_candidate() {
    let (service, _, _) = build_service(team(2));
    let distribution = service.distribution();

    distribution.add_analyst(JOB, AnalystId(2), Some(5)).expect("y added");
    for candidate in 1..=4 {
        distribution.route(JOB, CandidateId(candidate)).expect("routed");
    }
    distribution.add_analyst(JOB, AnalystId(1), Some(5)).expect("x added");

    let target = routed_to(distribution.route(JOB, CandidateId(5)).expect("routed"));

    assert_eq!(target, AnalystId(1));
    assert_eq!(counts(&service), vec![(2, 4), (1, 1)]);
}

#[test]
fn capacity_exhaustion_queues_and_release_drains() {
    let (service, _, notifier) = build_service(team(1));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), Some(2)).expect("added");

    distribution.route(JOB, CandidateId(1)).expect("routed");
    distribution.route(JOB, CandidateId(2)).expect("routed");
    let queued = distribution.route(JOB, CandidateId(3)).expect("no hard error");

    assert!(matches!(queued, RoutingOutcome::Queued { candidate_id: CandidateId(3), .. }));
    assert_eq!(distribution.queue(JOB).expect("queue").len(), 1);
    assert!(notifier
        .notices()
        .iter()
        .any(|notice| matches!(notice, AllocationNotice::CandidateQueued { .. })));

    let released = distribution.release(JOB, CandidateId(1)).expect("released");

    assert_eq!(released.released_from, Some(AnalystId(1)));
    assert_eq!(released.drained.len(), 1);
    assert_eq!(released.drained[0].candidate_id, CandidateId(3));
    assert!(distribution.queue(JOB).expect("queue").is_empty());
    assert_eq!(counts(&service), vec![(1, 2)]);
}

#[test]
fn routing_the_same_candidate_twice_is_rejected() {
    let (service, _, _) = build_service(team(1));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), None).expect("added");
    distribution.route(JOB, CandidateId(1)).expect("routed");

    assert!(matches!(
        distribution.route(JOB, CandidateId(1)),
        Err(DistributionError::CandidateAlreadyRouted { .. })
    ));
}

#[test]
fn pausing_excludes_from_routing_and_resuming_drains_the_queue() {
    let (service, _, _) = build_service(team(1));
    let distribution = service.distribution();
    let assignment = distribution.add_analyst(JOB, AnalystId(1), None).expect("added");

    distribution
        .toggle_active(JOB, assignment.id, false)
        .expect("paused");
    let outcome = distribution.route(JOB, CandidateId(1)).expect("no hard error");
    assert!(matches!(outcome, RoutingOutcome::Queued { .. }));

    let resumed = distribution
        .toggle_active(JOB, assignment.id, true)
        .expect("resumed");

    assert!(resumed.active);
    assert_eq!(resumed.assigned_count, 1);
    assert!(distribution.queue(JOB).expect("queue").is_empty());
}

#[test]
fn manual_assignment_bypasses_capacity_but_keeps_counters() {
    let (service, store, _) = build_service(team(2));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), Some(1)).expect("added");
    distribution.add_analyst(JOB, AnalystId(2), Some(1)).expect("added");
    distribution.route(JOB, CandidateId(1)).expect("routed");
    distribution.route(JOB, CandidateId(2)).expect("routed");

    let event = distribution
        .assign_manually(
            JOB,
            CandidateId(1),
            AnalystId(2),
            &operator(),
            Some("candidate asked for a Portuguese speaker".to_string()),
        )
        .expect("manual move");

    assert_eq!(event.kind, AssignmentKind::Manual);
    assert_eq!(event.previous_analyst, Some(AnalystId(1)));
    assert_eq!(counts(&service), vec![(1, 0), (2, 2)]);
    assert!(store.ledger(JOB).expect("ledger").is_consistent());
}

#[test]
fn removal_with_redistribution_moves_every_candidate() {
    let (service, store, notifier) = build_service(team(3));
    let distribution = service.distribution();
    for id in 1..=3 {
        distribution.add_analyst(JOB, AnalystId(id), None).expect("added");
    }
    for candidate in 1..=9 {
        distribution.route(JOB, CandidateId(candidate)).expect("routed");
    }
    let before = store.ledger(JOB).expect("ledger").active_candidate_total();

    let report = distribution
        .remove_analyst(JOB, AnalystId(2), true, &operator(), Some("left the team"))
        .expect("removed");

    let ledger = store.ledger(JOB).expect("ledger");
    assert_eq!(report.redistributed.len(), 3);
    assert!(report
        .redistributed
        .iter()
        .all(|event| event.kind == AssignmentKind::Redistribution
            && event.previous_analyst == Some(AnalystId(2))
            && event.reason.as_deref() == Some("left the team")));
    assert_eq!(ledger.active_candidate_total(), before);
    assert!(ledger.candidates_of(report.assignment.id).is_empty());
    assert!(ledger.is_consistent());
    assert_eq!(counts(&service), vec![(1, 5), (3, 4)]);
    assert!(notifier
        .notices()
        .iter()
        .any(|notice| matches!(notice, AllocationNotice::Redistributed { .. })));
}

#[test]
fn removal_without_capacity_left_is_rolled_back() {
    let (service, store, _) = build_service(team(2));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), None).expect("added");
    distribution.add_analyst(JOB, AnalystId(2), Some(1)).expect("added");
    for candidate in 1..=3 {
        distribution.route(JOB, CandidateId(candidate)).expect("routed");
    }
    let before = store.ledger(JOB).expect("ledger");

    let err = distribution
        .remove_analyst(JOB, AnalystId(1), true, &operator(), None)
        .expect_err("nobody can absorb the backlog");

    assert!(matches!(err, DistributionError::CapacityExhausted { .. }));
    assert_eq!(store.ledger(JOB).expect("ledger"), before);
}

#[test]
fn removing_the_last_analyst_with_redistribution_fails() {
    let (service, _, _) = build_service(team(1));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), None).expect("added");
    distribution.route(JOB, CandidateId(1)).expect("routed");

    let err = distribution
        .remove_analyst(JOB, AnalystId(1), true, &operator(), None)
        .expect_err("no remaining analyst");

    assert!(matches!(
        err,
        DistributionError::CapacityExhausted { unplaced: 1, .. }
    ));
    assert_eq!(counts(&service), vec![(1, 1)]);
}

#[test]
fn removal_without_redistribution_queues_the_backlog() {
    let (service, store, _) = build_service(team(2));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), None).expect("added");
    distribution.add_analyst(JOB, AnalystId(2), None).expect("added");
    for candidate in 1..=4 {
        distribution.route(JOB, CandidateId(candidate)).expect("routed");
    }

    let report = distribution
        .remove_analyst(JOB, AnalystId(1), false, &operator(), None)
        .expect("removed");

    assert_eq!(report.queued, vec![CandidateId(1), CandidateId(3)]);
    let queue = distribution.queue(JOB).expect("queue");
    assert!(queue.iter().all(|entry| entry.reason == "analyst removed"));
    assert!(store.ledger(JOB).expect("ledger").is_consistent());

    // A removed analyst can be attached again as a fresh row.
    let again = distribution.add_analyst(JOB, AnalystId(1), None).expect("re-added");
    assert_ne!(again.id, report.assignment.id);
    assert_eq!(again.assigned_count, 2);
    assert!(distribution.queue(JOB).expect("queue").is_empty());
}

#[test]
fn percentages_are_recomputed_after_each_change() {
    let (service, _, _) = build_service(team(2));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), None).expect("added");
    distribution.add_analyst(JOB, AnalystId(2), None).expect("added");
    for candidate in 1..=4 {
        distribution.route(JOB, CandidateId(candidate)).expect("routed");
    }
    distribution.release(JOB, CandidateId(2)).expect("released");

    let shares: Vec<f64> = distribution
        .list_assignments(JOB)
        .expect("assignments")
        .iter()
        .map(|assignment| assignment.distribution_percentage)
        .collect();

    assert_eq!(shares, vec![66.67, 33.33]);
}

#[test]
fn events_are_append_only() {
    let (service, _, _) = build_service(team(2));
    let distribution = service.distribution();
    distribution.add_analyst(JOB, AnalystId(1), None).expect("added");
    distribution.add_analyst(JOB, AnalystId(2), None).expect("added");
    distribution.route(JOB, CandidateId(1)).expect("routed");
    let first = distribution.events(JOB).expect("events");

    distribution
        .assign_manually(JOB, CandidateId(1), AnalystId(2), &operator(), None)
        .expect("moved");
    let after = distribution.events(JOB).expect("events");

    assert_eq!(after.len(), 2);
    assert_eq!(after[0], first[0]);
    assert_eq!(after[1].kind, AssignmentKind::Manual);
}

#[test]
fn unknown_jobs_are_rejected_by_every_operation() {
    let (service, store, _) = build_service(team(1));
    let distribution = service.distribution();
    let missing = JobId(999);

    assert!(matches!(
        distribution.add_analyst(missing, AnalystId(1), None),
        Err(DistributionError::JobNotFound(JobId(999)))
    ));
    assert!(matches!(
        distribution.route(missing, CandidateId(5)),
        Err(DistributionError::JobNotFound(_))
    ));
    assert!(matches!(
        distribution.assign_manually(missing, CandidateId(5), AnalystId(1), &operator(), None),
        Err(DistributionError::JobNotFound(_))
    ));
    assert!(matches!(
        distribution.release(missing, CandidateId(5)),
        Err(DistributionError::JobNotFound(_))
    ));
    assert!(matches!(
        distribution.remove_analyst(missing, AnalystId(1), true, &operator(), None),
        Err(DistributionError::JobNotFound(_))
    ));
    assert!(matches!(
        distribution.list_assignments(missing),
        Err(DistributionError::JobNotFound(_))
    ));
    assert!(matches!(
        distribution.events(missing),
        Err(DistributionError::JobNotFound(_))
    ));
    assert!(matches!(
        distribution.queue(missing),
        Err(DistributionError::JobNotFound(_))
    ));

    let ledger = store.ledger(missing).expect("ledger snapshot");
    assert!(ledger.assignments().is_empty());
    assert!(ledger.events().is_empty());
}
