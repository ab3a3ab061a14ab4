use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::allocation::domain::{
    AnalystId, AnalystProfile, AnalystScore, ClientEngagement, ClientId, JobId, JobSnapshot,
    UrgencyTier,
};
use crate::workflows::allocation::repository::{
    AllocationNotice, JustificationProvider, NoJustification, NotificationDispatcher, NotifyError,
    ProviderError,
};
use crate::workflows::allocation::{
    AllocationService, MemoryAllocationStore, RankingSettings,
};

pub(super) const CLIENT: ClientId = ClientId(7);

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn job(id: u64) -> JobSnapshot {
    JobSnapshot {
        id: JobId(id),
        title: format!("Backend engineer #{id}"),
        client_id: CLIENT,
        client_vip: false,
        required_stack: vec!["Rust".to_string(), "PostgreSQL".to_string()],
        opened_on: date(2025, 3, 1),
        deadline: Some(date(2025, 4, 15)),
        billing_value: 12_000,
        urgency: UrgencyTier::Medium,
    }
}

/// Analyst matching `job()` on stack, with no client history and a 5-candidate ceiling.
pub(super) fn analyst(id: u64, name: &str) -> AnalystProfile {
    AnalystProfile {
        id: AnalystId(id),
        name: name.to_string(),
        specialization_tags: vec!["rust".to_string(), "postgresql".to_string()],
        client_engagements: Vec::new(),
        active_candidates: 0,
        capacity: Some(5),
        approved_submissions: 8,
        total_submissions: 10,
        mean_response_hours: Some(24.0),
    }
}

pub(super) fn with_client_history(mut profile: AnalystProfile, placements: u32) -> AnalystProfile {
    profile.client_engagements.push(ClientEngagement {
        client_id: CLIENT,
        successful_placements: placements,
    });
    profile
}

pub(super) fn store_with(
    jobs: Vec<JobSnapshot>,
    analysts: Vec<AnalystProfile>,
) -> Arc<MemoryAllocationStore> {
    Arc::new(MemoryAllocationStore::with_catalog(jobs, analysts))
}

pub(super) fn settings() -> RankingSettings {
    RankingSettings {
        provider_timeout: Duration::from_millis(50),
        suggestion_size: 2,
    }
}

pub(super) fn build_service(
    analysts: Vec<AnalystProfile>,
) -> (
    AllocationService<MemoryAllocationStore, MemoryNotifier>,
    Arc<MemoryAllocationStore>,
    Arc<MemoryNotifier>,
) {
    let store = store_with(vec![job(1), job(2)], analysts);
    let notifier = Arc::new(MemoryNotifier::default());
    let service = AllocationService::new(
        store.clone(),
        notifier.clone(),
        Arc::new(NoJustification),
        settings(),
    );
    (service, store, notifier)
}

pub(super) fn service_with_provider(
    analysts: Vec<AnalystProfile>,
    provider: Arc<dyn JustificationProvider>,
) -> AllocationService<MemoryAllocationStore, MemoryNotifier> {
    AllocationService::new(
        store_with(vec![job(1)], analysts),
        Arc::new(MemoryNotifier::default()),
        provider,
        settings(),
    )
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    notices: Mutex<Vec<AllocationNotice>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<AllocationNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationDispatcher for MemoryNotifier {
    fn dispatch(&self, notice: AllocationNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationDispatcher for FailingNotifier {
    fn dispatch(&self, _notice: AllocationNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

/// Answers every call with a short sentence naming the analyst.
pub(super) struct EchoProvider;

#[async_trait]
impl JustificationProvider for EchoProvider {
    async fn justify(
        &self,
        _job: &JobSnapshot,
        score: &AnalystScore,
    ) -> Result<Option<String>, ProviderError> {
        Ok(Some(format!("{} knows the stack", score.analyst_name)))
    }
}

pub(super) struct SlowProvider(pub(super) Duration);

#[async_trait]
impl JustificationProvider for SlowProvider {
    async fn justify(
        &self,
        _job: &JobSnapshot,
        _score: &AnalystScore,
    ) -> Result<Option<String>, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(Some("too late to matter".to_string()))
    }
}

pub(super) struct FailingProvider;

#[async_trait]
impl JustificationProvider for FailingProvider {
    async fn justify(
        &self,
        _job: &JobSnapshot,
        _score: &AnalystScore,
    ) -> Result<Option<String>, ProviderError> {
        Err(ProviderError::Unavailable("model quota exceeded".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
