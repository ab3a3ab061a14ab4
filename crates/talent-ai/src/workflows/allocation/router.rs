use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::distribution::{DistributionError, RoutingOutcome};
use super::domain::{AnalystId, AssignmentId, CandidateId, DecisionId, JobId, UserId};
use super::ranking::{DecisionError, DecisionRequest, RankingError};
use super::repository::{AllocationStore, NotificationDispatcher};
use super::service::{AllocationService, AllocationServiceError};
use super::weighting::{
    ConfigKind, DistributionConfig, PrioritizationConfig, WeightingError, WeightingProfile,
};

const DEFAULT_HISTORY_LIMIT: usize = 20;

type SharedService<S, N> = State<Arc<AllocationService<S, N>>>;

/// HTTP endpoints for configuration, ranking, decisions, and candidate distribution.
pub fn allocation_router<S, N>(service: Arc<AllocationService<S, N>>) -> Router
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/allocation/config/:kind",
            get(active_config_handler::<S, N>).post(propose_config_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/config/:kind/history",
            get(config_history_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/config/:kind/versions",
            get(config_versions_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/priority",
            post(prioritize_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/ranking",
            get(ranking_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/decisions",
            get(decisions_handler::<S, N>).post(record_decision_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/decisions/:decision_id/apply",
            post(apply_decision_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/assignments",
            get(list_assignments_handler::<S, N>).post(add_analyst_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/assignments/:assignment_id/active",
            post(toggle_active_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/analysts/:analyst_id",
            axum::routing::delete(remove_analyst_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/candidates",
            post(route_candidate_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/candidates/:candidate_id/manual",
            post(manual_assignment_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/candidates/:candidate_id/release",
            post(release_candidate_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/events",
            get(events_handler::<S, N>),
        )
        .route(
            "/api/v1/allocation/jobs/:job_id/queue",
            get(queue_handler::<S, N>),
        )
        .with_state(service)
}

fn status_for(error: &AllocationServiceError) -> StatusCode {
    use AllocationServiceError as E;

    match error {
        E::Weighting(WeightingError::Validation(_))
        | E::Decision(DecisionError::Validation(_))
        | E::Decision(DecisionError::MissingJustification { .. })
        | E::Distribution(DistributionError::InvalidCapacity) => StatusCode::UNPROCESSABLE_ENTITY,
        E::Weighting(WeightingError::StaleVersion { .. })
        | E::Distribution(DistributionError::AlreadyAssigned { .. })
        | E::Distribution(DistributionError::CandidateAlreadyRouted { .. })
        | E::Distribution(DistributionError::CapacityExhausted { .. }) => StatusCode::CONFLICT,
        E::Weighting(WeightingError::NotFound(_))
        | E::Ranking(RankingError::JobNotFound(_))
        | E::Decision(DecisionError::JobNotFound(_))
        | E::Distribution(DistributionError::AnalystNotAssigned { .. })
        | E::Distribution(DistributionError::AssignmentNotFound { .. })
        | E::Distribution(DistributionError::CandidateNotFound { .. })
        | E::Distribution(DistributionError::UnknownAnalyst(_))
        | E::Distribution(DistributionError::JobNotFound(_))
        | E::JobNotFound(_)
        | E::DecisionNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: AllocationServiceError) -> Response {
    let status = status_for(&error);
    let payload = match &error {
        AllocationServiceError::Weighting(WeightingError::Validation(violations))
        | AllocationServiceError::Decision(DecisionError::Validation(violations)) => json!({
            "error": error.to_string(),
            "violations": violations,
        }),
        AllocationServiceError::Decision(DecisionError::MissingJustification { field }) => json!({
            "error": error.to_string(),
            "field": field,
        }),
        _ => json!({
            "error": error.to_string(),
        }),
    };
    (status, Json(payload)).into_response()
}

fn respond<T, E>(status: StatusCode, result: Result<T, E>) -> Response
where
    T: Serialize,
    E: Into<AllocationServiceError>,
{
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error.into()),
    }
}

fn unprocessable(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn parse_kind(raw: &str) -> Result<ConfigKind, Response> {
    ConfigKind::from_str(raw).map_err(|message| {
        (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
    })
}

pub(crate) async fn active_config_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(kind): Path<String>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match parse_kind(&kind) {
        Ok(kind) => respond(StatusCode::OK, service.configuration().active(kind)),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProposeConfigBody {
    pub(crate) actor: UserId,
    pub(crate) config: serde_json::Value,
}

pub(crate) async fn propose_config_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(kind): Path<String>,
    Json(body): Json<ProposeConfigBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let profile = match kind {
        ConfigKind::Distribution => serde_json::from_value::<DistributionConfig>(body.config)
            .map(WeightingProfile::Distribution),
        ConfigKind::Prioritization => serde_json::from_value::<PrioritizationConfig>(body.config)
            .map(WeightingProfile::Prioritization),
    };
    match profile {
        Ok(profile) => respond(
            StatusCode::CREATED,
            service.configuration().propose(profile, &body.actor),
        ),
        Err(err) => unprocessable(format!("malformed {kind} configuration: {err}")),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn config_history_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(kind): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match parse_kind(&kind) {
        Ok(kind) => {
            let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
            respond(StatusCode::OK, service.configuration().history(kind, limit))
        }
        Err(response) => response,
    }
}

pub(crate) async fn config_versions_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(kind): Path<String>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match parse_kind(&kind) {
        Ok(kind) => respond(StatusCode::OK, service.configuration().versions(kind)),
        Err(response) => response,
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PriorityBody {
    #[serde(default)]
    pub(crate) job_ids: Vec<JobId>,
    #[serde(default)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) async fn prioritize_handler<S, N>(
    State(service): SharedService<S, N>,
    Json(body): Json<PriorityBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let today = body.today.unwrap_or_else(|| Utc::now().date_naive());
    respond(
        StatusCode::OK,
        service.prioritize_jobs(&body.job_ids, today),
    )
}

pub(crate) async fn ranking_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(StatusCode::OK, service.rank(JobId(job_id)).await)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionBody {
    pub(crate) suggested: Vec<AnalystId>,
    pub(crate) chosen: Vec<AnalystId>,
    pub(crate) actor: UserId,
    #[serde(default)]
    pub(crate) justification: Option<String>,
    #[serde(default)]
    pub(crate) override_reason: Option<String>,
}

pub(crate) async fn record_decision_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
    Json(body): Json<DecisionBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let request = DecisionRequest {
        job_id: JobId(job_id),
        suggested: body.suggested,
        chosen: body.chosen,
        actor: body.actor,
        justification: body.justification,
        override_reason: body.override_reason,
    };
    respond(StatusCode::CREATED, service.record_decision(request))
}

pub(crate) async fn decisions_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(StatusCode::OK, service.ranking().decisions(JobId(job_id)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CapacityBody {
    #[serde(default)]
    pub(crate) max_candidates: Option<u32>,
}

pub(crate) async fn apply_decision_handler<S, N>(
    State(service): SharedService<S, N>,
    Path((job_id, decision_id)): Path<(u64, u64)>,
    Json(body): Json<CapacityBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        StatusCode::OK,
        service.apply_decision(JobId(job_id), DecisionId(decision_id), body.max_candidates),
    )
}

pub(crate) async fn list_assignments_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        StatusCode::OK,
        service.distribution().list_assignments(JobId(job_id)),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddAnalystBody {
    pub(crate) analyst_id: AnalystId,
    #[serde(default)]
    pub(crate) max_candidates: Option<u32>,
}

pub(crate) async fn add_analyst_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
    Json(body): Json<AddAnalystBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        StatusCode::CREATED,
        service
            .distribution()
            .add_analyst(JobId(job_id), body.analyst_id, body.max_candidates),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActiveBody {
    pub(crate) active: bool,
}

pub(crate) async fn toggle_active_handler<S, N>(
    State(service): SharedService<S, N>,
    Path((job_id, assignment_id)): Path<(u64, u64)>,
    Json(body): Json<ActiveBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        StatusCode::OK,
        service.distribution().toggle_active(
            JobId(job_id),
            AssignmentId(assignment_id),
            body.active,
        ),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemovalQuery {
    #[serde(default)]
    pub(crate) redistribute: bool,
    pub(crate) actor: String,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn remove_analyst_handler<S, N>(
    State(service): SharedService<S, N>,
    Path((job_id, analyst_id)): Path<(u64, u64)>,
    Query(query): Query<RemovalQuery>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = UserId(query.actor);
    respond(
        StatusCode::OK,
        service.distribution().remove_analyst(
            JobId(job_id),
            AnalystId(analyst_id),
            query.redistribute,
            &actor,
            query.reason.as_deref(),
        ),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateBody {
    pub(crate) candidate_id: CandidateId,
}

pub(crate) async fn route_candidate_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
    Json(body): Json<CandidateBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.distribution().route(JobId(job_id), body.candidate_id) {
        Ok(outcome @ RoutingOutcome::Assigned { .. }) => {
            (StatusCode::CREATED, Json(outcome)).into_response()
        }
        Ok(outcome @ RoutingOutcome::Queued { .. }) => {
            (StatusCode::ACCEPTED, Json(outcome)).into_response()
        }
        Err(error) => error_response(error.into()),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ManualAssignmentBody {
    pub(crate) analyst_id: AnalystId,
    pub(crate) actor: UserId,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn manual_assignment_handler<S, N>(
    State(service): SharedService<S, N>,
    Path((job_id, candidate_id)): Path<(u64, u64)>,
    Json(body): Json<ManualAssignmentBody>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        StatusCode::CREATED,
        service.distribution().assign_manually(
            JobId(job_id),
            CandidateId(candidate_id),
            body.analyst_id,
            &body.actor,
            body.reason,
        ),
    )
}

pub(crate) async fn release_candidate_handler<S, N>(
    State(service): SharedService<S, N>,
    Path((job_id, candidate_id)): Path<(u64, u64)>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        StatusCode::OK,
        service
            .distribution()
            .release(JobId(job_id), CandidateId(candidate_id)),
    )
}

pub(crate) async fn events_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(StatusCode::OK, service.distribution().events(JobId(job_id)))
}

pub(crate) async fn queue_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(job_id): Path<u64>,
) -> Response
where
    S: AllocationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(StatusCode::OK, service.distribution().queue(JobId(job_id)))
}
