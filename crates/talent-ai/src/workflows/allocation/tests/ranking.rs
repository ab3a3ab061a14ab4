use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::workflows::allocation::domain::{
    AnalystId, CandidateId, DecisionType, JobId, OverrideReason, UserId,
};
use crate::workflows::allocation::repository::{AllocationNotice, NoJustification};
use crate::workflows::allocation::{
    AllocationService, AllocationServiceError, DecisionError, DecisionRequest, RankingError,
};

fn ids(values: &[u64]) -> Vec<AnalystId> {
    values.iter().copied().map(AnalystId).collect()
}

fn decision(suggested: &[u64], chosen: &[u64], reason: Option<&str>) -> DecisionRequest {
    DecisionRequest {
        job_id: JobId(1),
        suggested: ids(suggested),
        chosen: ids(chosen),
        actor: UserId("recruiter.ana".to_string()),
        justification: None,
        override_reason: reason.map(str::to_string),
    }
}

/// Analysts 3, 7, 9 in descending score order.
fn three_analysts() -> Vec<crate::workflows::allocation::domain::AnalystProfile> {
    let mut third = analyst(9, "Bruno");
    third.active_candidates = 3;
    vec![
        with_client_history(analyst(3, "Ana"), 5),
        with_client_history(analyst(7, "Davi"), 2),
        third,
    ]
}

#[tokio::test]
async fn rank_orders_by_total_with_load_then_id_tiebreak() {
    let mut busy = analyst(5, "Busy");
    busy.active_candidates = 1;
    busy.capacity = Some(20);
    let mut idle = analyst(8, "Idle");
    idle.capacity = Some(20);
    let twin = {
        let mut profile = analyst(2, "Twin");
        profile.capacity = Some(20);
        profile
    };
    let (service, _, _) = build_service(vec![busy, idle, twin]);

    let outcome = service.rank(JobId(1)).await.expect("ranking succeeds");

    // Busy loses one load point to the others, who tie and fall back to id order.
    let order: Vec<u64> = outcome.scores.iter().map(|s| s.analyst_id.0).collect();
    assert_eq!(order, vec![2, 8, 5]);
    assert_eq!(outcome.suggested, ids(&[2, 8]));
    assert!(!outcome.degraded);
    assert_eq!(outcome.config_version, None);
}

#[tokio::test]
async fn rank_is_reproducible_on_unchanged_state() {
    let (service, _, _) = build_service(three_analysts());
    service.configuration().bootstrap().expect("bootstrap");

    let first = service.rank(JobId(1)).await.expect("first ranking");
    let second = service.rank(JobId(1)).await.expect("second ranking");

    assert_eq!(first, second);
    assert_eq!(first.config_version, Some(1));
}

#[tokio::test]
async fn lighter_load_ranks_first_when_everything_else_ties() {
    let x = analyst(1, "X");
    let mut y = analyst(2, "Y");
    y.active_candidates = 4;
    let (service, _, _) = build_service(vec![y, x]);
    service.configuration().bootstrap().expect("bootstrap");

    let outcome = service.rank(JobId(1)).await.expect("ranking succeeds");

    assert_eq!(outcome.scores[0].analyst_id, AnalystId(1));
    assert_eq!(outcome.scores[0].load, 20);
    assert_eq!(outcome.scores[1].load, 4);
}

#[tokio::test]
async fn rank_unknown_job_is_not_found() {
    let (service, _, _) = build_service(three_analysts());

    let err = service.rank(JobId(404)).await.expect_err("unknown job");

    assert!(matches!(
        err,
        AllocationServiceError::Ranking(RankingError::JobNotFound(JobId(404)))
    ));
}

#[tokio::test]
async fn provider_text_is_attached_to_suggested_analysts() {
    let service = service_with_provider(three_analysts(), Arc::new(EchoProvider));

    let outcome = service.rank(JobId(1)).await.expect("ranking succeeds");

    assert_eq!(
        outcome.scores[0].ai_summary.as_deref(),
        Some("Ana knows the stack")
    );
    assert!(outcome.scores[1].ai_summary.is_some());
    assert!(outcome.scores[2].ai_summary.is_none());
    assert!(!outcome.degraded);
}

#[tokio::test]
async fn slow_provider_degrades_instead_of_failing() {
    let service = service_with_provider(
        three_analysts(),
        Arc::new(SlowProvider(Duration::from_secs(5))),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(2), service.rank(JobId(1)))
        .await
        .expect("ranking bounded by the provider timeout")
        .expect("ranking succeeds");

    assert!(outcome.degraded);
    assert!(outcome.scores.iter().all(|score| score.ai_summary.is_none()));
    assert_eq!(outcome.suggested, ids(&[3, 7]));
}

#[tokio::test]
async fn failing_provider_keeps_configuration_scores() {
    let service = service_with_provider(three_analysts(), Arc::new(FailingProvider));
    let baseline = service_with_provider(three_analysts(), Arc::new(NoJustification));

    let degraded = service.rank(JobId(1)).await.expect("ranking succeeds");
    let plain = baseline.rank(JobId(1)).await.expect("ranking succeeds");

    assert!(degraded.degraded);
    assert_eq!(degraded.scores, plain.scores);
}

#[test]
fn same_set_in_reverse_order_is_accepted_without_reason() {
    let (service, _, notifier) = build_service(three_analysts());

    let recorded = service
        .record_decision(decision(&[3, 7], &[7, 3], None))
        .expect("decision recorded");

    assert_eq!(recorded.decision_type, DecisionType::AiAccepted);
    assert!(recorded.override_reason.is_none());
    assert!(matches!(
        notifier.notices().as_slice(),
        [AllocationNotice::DecisionRecorded {
            decision_type: DecisionType::AiAccepted,
            ..
        }]
    ));
}

#[test]
fn override_without_reason_is_rejected_and_not_logged() {
    let (service, _, _) = build_service(three_analysts());

    let err = service
        .record_decision(decision(&[3, 7], &[3, 9], None))
        .expect_err("override needs a reason");

    assert!(matches!(
        err,
        AllocationServiceError::Decision(DecisionError::MissingJustification {
            field: "override_reason"
        })
    ));
    assert!(service
        .ranking()
        .decisions(JobId(1))
        .expect("feed")
        .is_empty());
}

#[test]
fn override_with_reason_code_is_recorded_and_retrievable() {
    let (service, _, _) = build_service(three_analysts());

    let recorded = service
        .record_decision(decision(&[3, 7], &[3, 9], Some("balanceamento_carga")))
        .expect("override recorded");

    assert_eq!(recorded.decision_type, DecisionType::ManualOverride);
    assert_eq!(
        recorded.override_reason,
        Some(OverrideReason::WorkloadBalance)
    );
    let feed = service.ranking().decisions(JobId(1)).expect("feed");
    assert_eq!(feed, vec![recorded]);
}

#[test]
fn other_reason_requires_free_text() {
    let (service, _, _) = build_service(three_analysts());

    let err = service
        .record_decision(decision(&[3, 7], &[9], Some("other")))
        .expect_err("other needs text");
    assert!(matches!(
        err,
        AllocationServiceError::Decision(DecisionError::MissingJustification {
            field: "justification"
        })
    ));

    let mut request = decision(&[3, 7], &[9], Some("other"));
    request.justification = Some("Client asked for Bruno by name".to_string());
    let recorded = service.record_decision(request).expect("recorded");
    assert_eq!(recorded.override_reason, Some(OverrideReason::Other));
}

#[test]
fn empty_choice_and_unknown_code_are_reported_together() {
    let (service, _, _) = build_service(three_analysts());

    let err = service
        .record_decision(decision(&[3, 7], &[], Some("vibes")))
        .expect_err("invalid decision");

    match err {
        AllocationServiceError::Decision(DecisionError::Validation(violations)) => {
            let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
            assert_eq!(fields, vec!["chosen", "override_reason"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn recording_a_decision_leaves_assignments_untouched() {
    let (service, _, _) = build_service(three_analysts());

    service
        .record_decision(decision(&[3, 7], &[3, 7], None))
        .expect("recorded");

    assert!(service
        .distribution()
        .list_assignments(JobId(1))
        .expect("assignments")
        .is_empty());
}

#[test]
fn notification_failures_do_not_fail_the_decision() {
    let store = store_with(vec![job(1)], three_analysts());
    let service = AllocationService::new(
        store,
        Arc::new(FailingNotifier),
        Arc::new(NoJustification),
        settings(),
    );

    let recorded = service.record_decision(decision(&[3, 7], &[3], None));

    assert!(recorded.is_ok());
}

#[test]
fn decision_feed_is_oldest_first() {
    let (service, _, _) = build_service(three_analysts());
    let first = service
        .record_decision(decision(&[3, 7], &[3], None))
        .expect("first");
    let second = service
        .record_decision(decision(&[3, 7], &[7], Some("disponibilidade")))
        .expect("second");

    let feed = service.ranking().decisions(JobId(1)).expect("feed");

    assert_eq!(
        feed.iter().map(|d| d.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
}

#[test]
fn applying_a_decision_attaches_the_chosen_analysts() {
    let (service, _, _) = build_service(three_analysts());
    let recorded = service
        .record_decision(decision(&[3, 7], &[7, 3], None))
        .expect("recorded");

    let applied = service
        .apply_decision(JobId(1), recorded.id, Some(4))
        .expect("applied");

    let attached: Vec<AnalystId> = applied.attached.iter().map(|a| a.analyst_id).collect();
    assert_eq!(attached, ids(&[7, 3]));
    assert!(applied
        .attached
        .iter()
        .all(|assignment| assignment.max_candidates == Some(4)));
}

#[tokio::test]
async fn ranking_sees_load_routed_by_the_distributor() {
    let (service, _, _) = build_service(vec![analyst(1, "X"), analyst(2, "Y")]);
    service.configuration().bootstrap().expect("bootstrap");

    let before = service.rank(JobId(1)).await.expect("ranking succeeds");
    assert_eq!(before.suggested, ids(&[1, 2]));

    let distribution = service.distribution();
    distribution
        .add_analyst(JobId(1), AnalystId(1), Some(5))
        .expect("x attached");
    for candidate in 1..=5 {
        distribution
            .route(JobId(1), CandidateId(candidate))
            .expect("routed");
    }

    let after = service.rank(JobId(1)).await.expect("ranking succeeds");
    let x = after
        .scores
        .iter()
        .find(|score| score.analyst_id == AnalystId(1))
        .expect("x ranked");
    assert_eq!(x.current_load, 5);
    assert_eq!(x.load, 0);
    assert_eq!(after.suggested, ids(&[2, 1]));

    let other_job = service.rank(JobId(2)).await.expect("ranking succeeds");
    assert_eq!(other_job.scores[0].analyst_id, AnalystId(2));
}
