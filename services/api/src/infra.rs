use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talent_ai::config::AllocationConfig;
use talent_ai::error::AppError;
use talent_ai::workflows::allocation::{
    AllocationNotice, AllocationService, AnalystId, AnalystProfile, AnalystScore,
    ClientEngagement, ClientId, JobId, JobSnapshot, JustificationProvider, MemoryAllocationStore,
    NoJustification, NotificationDispatcher, NotifyError, ProviderError, UrgencyTier,
};
use tracing::{info, warn};

pub(crate) type AllocationApi = AllocationService<MemoryAllocationStore, TracingNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Sends allocation notices to the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    fn dispatch(&self, notice: AllocationNotice) -> Result<(), NotifyError> {
        match notice {
            AllocationNotice::DecisionRecorded {
                job_id,
                decision_id,
                decision_type,
            } => info!(
                %job_id,
                %decision_id,
                decision_type = decision_type.label(),
                "notice: allocation decision recorded"
            ),
            AllocationNotice::Redistributed {
                job_id,
                from_analyst,
                moved,
            } => info!(
                %job_id,
                %from_analyst,
                moved = moved.len(),
                "notice: candidates redistributed"
            ),
            AllocationNotice::CandidateQueued {
                job_id,
                candidate_id,
                reason,
            } => warn!(%job_id, %candidate_id, %reason, "notice: candidate waiting for capacity"),
        }
        Ok(())
    }
}

/// Offline stand-in for an AI provider: phrases the strongest scoring factor as a sentence.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FactorNarrator;

#[async_trait]
impl JustificationProvider for FactorNarrator {
    async fn justify(
        &self,
        job: &JobSnapshot,
        score: &AnalystScore,
    ) -> Result<Option<String>, ProviderError> {
        let strongest = [
            ("stack expertise", score.specialization, 30u8),
            ("history with the client", score.client_fit, 25),
            ("free capacity", score.load, 20),
            ("approval record", score.approval_rate, 15),
            ("response speed", score.speed, 10),
        ]
        .into_iter()
        .max_by(|a, b| {
            (u32::from(a.1) * 100 / u32::from(a.2)).cmp(&(u32::from(b.1) * 100 / u32::from(b.2)))
        });

        Ok(strongest.map(|(label, _, _)| {
            format!(
                "{} stands out on {label} for '{}'",
                score.analyst_name, job.title
            )
        }))
    }
}

/// Job and analyst directories served by the in-memory store.
#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct Catalog {
    #[serde(default)]
    pub(crate) jobs: Vec<JobSnapshot>,
    #[serde(default)]
    pub(crate) analysts: Vec<AnalystProfile>,
}

impl Catalog {
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw).map_err(|err| {
                    AppError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("catalog {}: {err}", path.display()),
                    ))
                })
            }
            None => Ok(Self::sample()),
        }
    }

    pub(crate) fn sample() -> Self {
        let jobs = vec![
            JobSnapshot {
                id: JobId(1),
                title: "Senior Rust engineer".to_string(),
                client_id: ClientId(10),
                client_vip: true,
                required_stack: tags(&["Rust", "PostgreSQL", "Kubernetes"]),
                opened_on: sample_date(3, 3),
                deadline: Some(sample_date(4, 18)),
                billing_value: 18_000,
                urgency: UrgencyTier::High,
            },
            JobSnapshot {
                id: JobId(2),
                title: "Data platform lead".to_string(),
                client_id: ClientId(20),
                client_vip: false,
                required_stack: tags(&["Python", "Spark"]),
                opened_on: sample_date(2, 10),
                deadline: Some(sample_date(5, 30)),
                billing_value: 14_500,
                urgency: UrgencyTier::Medium,
            },
            JobSnapshot {
                id: JobId(3),
                title: "QA analyst".to_string(),
                client_id: ClientId(10),
                client_vip: false,
                required_stack: tags(&["Cypress"]),
                opened_on: sample_date(3, 20),
                deadline: None,
                billing_value: 6_000,
                urgency: UrgencyTier::Low,
            },
        ];

        let analysts = vec![
            AnalystProfile {
                client_engagements: engagements(&[(10, 4)]),
                active_candidates: 3,
                capacity: Some(8),
                approved_submissions: 18,
                total_submissions: 24,
                mean_response_hours: Some(6.0),
                ..sample_analyst(1, "Ana Souza", &["rust", "postgresql"])
            },
            AnalystProfile {
                active_candidates: 6,
                capacity: Some(8),
                approved_submissions: 9,
                total_submissions: 15,
                mean_response_hours: Some(20.0),
                ..sample_analyst(2, "Bruno Lima", &["rust", "kubernetes", "postgresql"])
            },
            AnalystProfile {
                client_engagements: engagements(&[(20, 2)]),
                active_candidates: 1,
                approved_submissions: 11,
                total_submissions: 14,
                mean_response_hours: Some(10.0),
                ..sample_analyst(3, "Carla Dias", &["python", "spark"])
            },
            AnalystProfile {
                client_engagements: engagements(&[(10, 1)]),
                capacity: Some(6),
                ..sample_analyst(4, "Diego Reis", &["kubernetes"])
            },
            AnalystProfile {
                client_engagements: engagements(&[(10, 3)]),
                active_candidates: 2,
                capacity: Some(5),
                approved_submissions: 7,
                total_submissions: 9,
                mean_response_hours: Some(30.0),
                ..sample_analyst(5, "Elisa Prado", &["cypress", "python"])
            },
        ];

        Self { jobs, analysts }
    }
}

fn sample_date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap_or_default()
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn engagements(history: &[(u64, u32)]) -> Vec<ClientEngagement> {
    history
        .iter()
        .map(|(client, placements)| ClientEngagement {
            client_id: ClientId(*client),
            successful_placements: *placements,
        })
        .collect()
}

/// Profile with no history, load, or submissions yet.
fn sample_analyst(id: u64, name: &str, specialization: &[&str]) -> AnalystProfile {
    AnalystProfile {
        id: AnalystId(id),
        name: name.to_string(),
        specialization_tags: tags(specialization),
        client_engagements: Vec::new(),
        active_candidates: 0,
        capacity: None,
        approved_submissions: 0,
        total_submissions: 0,
        mean_response_hours: None,
    }
}

/// Build the allocation service over an in-memory store and seed the default weightings.
pub(crate) fn build_allocation_service(
    settings: &AllocationConfig,
    catalog: Catalog,
    narrate: bool,
) -> Result<Arc<AllocationApi>, AppError> {
    let store = Arc::new(MemoryAllocationStore::with_catalog(
        catalog.jobs,
        catalog.analysts,
    ));
    let justifier: Arc<dyn JustificationProvider> = if narrate {
        Arc::new(FactorNarrator)
    } else {
        Arc::new(NoJustification)
    };
    let service = AllocationService::new(
        store,
        Arc::new(TracingNotifier),
        justifier,
        settings.ranking_settings(),
    );

    let seeded = service.configuration().bootstrap()?;
    if !seeded.is_empty() {
        info!(seeded = seeded.len(), "default weighting configurations activated");
    }
    Ok(Arc::new(service))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
