use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::distribution::JobLedger;
use super::domain::{AllocationDecision, AnalystId, AnalystProfile, DecisionId, JobId, JobSnapshot};
use super::repository::{
    AnalystDirectory, AssignmentRepository, ConfigurationRepository, DecisionDraft, DecisionLog,
    JobDirectory, RepositoryError,
};
use super::weighting::{ConfigChange, ConfigKind, StoredConfig};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store lock poisoned".to_string()))
}

#[derive(Debug, Default)]
struct ConfigTable {
    versions: Vec<StoredConfig>,
    history: Vec<ConfigChange>,
}

impl ConfigTable {
    fn active_version(&self) -> Option<u32> {
        self.versions
            .iter()
            .find(|stored| stored.active)
            .map(|stored| stored.version)
    }
}

#[derive(Debug, Default)]
struct DecisionTable {
    last_id: u64,
    rows: Vec<AllocationDecision>,
}

/// Process-local store backing every allocation repository trait.
///
/// Clones share state. Each job's ledger sits behind its own lock, so writers on different jobs
/// never wait on each other. Analyst profiles report their catalog load plus every candidate
/// currently routed to them through a ledger.
#[derive(Debug, Default, Clone)]
pub struct MemoryAllocationStore {
    configs: Arc<Mutex<HashMap<ConfigKind, ConfigTable>>>,
    decisions: Arc<Mutex<DecisionTable>>,
    ledgers: Arc<Mutex<HashMap<JobId, Arc<Mutex<JobLedger>>>>>,
    analysts: Arc<Mutex<BTreeMap<AnalystId, AnalystProfile>>>,
    jobs: Arc<Mutex<BTreeMap<JobId, JobSnapshot>>>,
}

impl MemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the job and analyst directories.
    pub fn with_catalog(
        jobs: impl IntoIterator<Item = JobSnapshot>,
        analysts: impl IntoIterator<Item = AnalystProfile>,
    ) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.jobs.lock() {
            guard.extend(jobs.into_iter().map(|job| (job.id, job)));
        }
        if let Ok(mut guard) = store.analysts.lock() {
            guard.extend(analysts.into_iter().map(|analyst| (analyst.id, analyst)));
        }
        store
    }

    pub fn upsert_job(&self, job: JobSnapshot) -> Result<(), RepositoryError> {
        lock(&self.jobs)?.insert(job.id, job);
        Ok(())
    }

    pub fn upsert_analyst(&self, analyst: AnalystProfile) -> Result<(), RepositoryError> {
        lock(&self.analysts)?.insert(analyst.id, analyst);
        Ok(())
    }

    /// Candidates currently routed to each analyst across every job ledger.
    fn routed_loads(&self) -> Result<HashMap<AnalystId, u32>, RepositoryError> {
        let handles: Vec<Arc<Mutex<JobLedger>>> =
            lock(&self.ledgers)?.values().cloned().collect();

        let mut loads = HashMap::new();
        for handle in handles {
            let ledger = lock(&handle)?;
            for assignment in ledger.all_assignments() {
                if assignment.is_attached() {
                    *loads.entry(assignment.analyst_id).or_insert(0) += assignment.assigned_count;
                }
            }
        }
        Ok(loads)
    }

    fn with_routed_load(
        profile: &AnalystProfile,
        loads: &HashMap<AnalystId, u32>,
    ) -> AnalystProfile {
        let mut profile = profile.clone();
        if let Some(routed) = loads.get(&profile.id) {
            profile.active_candidates = profile.active_candidates.saturating_add(*routed);
        }
        profile
    }

    fn ledger_handle(&self, job_id: JobId) -> Result<Arc<Mutex<JobLedger>>, RepositoryError> {
        let mut ledgers = lock(&self.ledgers)?;
        Ok(ledgers
            .entry(job_id)
            .or_insert_with(|| Arc::new(Mutex::new(JobLedger::new(job_id))))
            .clone())
    }
}

impl ConfigurationRepository for MemoryAllocationStore {
    fn active_config(&self, kind: ConfigKind) -> Result<Option<StoredConfig>, RepositoryError> {
        let configs = lock(&self.configs)?;
        Ok(configs.get(&kind).and_then(|table| {
            table
                .versions
                .iter()
                .find(|stored| stored.active)
                .cloned()
        }))
    }

    fn activate_config(
        &self,
        expected_active: Option<u32>,
        config: StoredConfig,
        changes: Vec<ConfigChange>,
    ) -> Result<StoredConfig, RepositoryError> {
        let mut configs = lock(&self.configs)?;
        let table = configs.entry(config.kind()).or_default();
        if table.active_version() != expected_active {
            return Err(RepositoryError::Conflict);
        }
        if table
            .versions
            .iter()
            .any(|stored| stored.version == config.version)
        {
            return Err(RepositoryError::Conflict);
        }

        for stored in table.versions.iter_mut() {
            stored.active = false;
        }
        let mut config = config;
        config.active = true;
        table.versions.push(config.clone());
        table.history.extend(changes);
        Ok(config)
    }

    fn config_versions(&self, kind: ConfigKind) -> Result<Vec<StoredConfig>, RepositoryError> {
        let configs = lock(&self.configs)?;
        Ok(configs
            .get(&kind)
            .map(|table| table.versions.clone())
            .unwrap_or_default())
    }

    fn config_history(
        &self,
        kind: ConfigKind,
        limit: usize,
    ) -> Result<Vec<ConfigChange>, RepositoryError> {
        let configs = lock(&self.configs)?;
        Ok(configs
            .get(&kind)
            .map(|table| table.history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

impl DecisionLog for MemoryAllocationStore {
    fn append_decision(
        &self,
        draft: DecisionDraft,
    ) -> Result<AllocationDecision, RepositoryError> {
        let mut table = lock(&self.decisions)?;
        table.last_id += 1;
        let decision = AllocationDecision {
            id: DecisionId(table.last_id),
            job_id: draft.job_id,
            suggested: draft.suggested,
            chosen: draft.chosen,
            decision_type: draft.decision_type,
            justification: draft.justification,
            override_reason: draft.override_reason,
            decided_at: draft.decided_at,
            decided_by: draft.decided_by,
        };
        table.rows.push(decision.clone());
        Ok(decision)
    }

    fn decisions(&self, job_id: JobId) -> Result<Vec<AllocationDecision>, RepositoryError> {
        let table = lock(&self.decisions)?;
        Ok(table
            .rows
            .iter()
            .filter(|decision| decision.job_id == job_id)
            .cloned()
            .collect())
    }
}

impl AssignmentRepository for MemoryAllocationStore {
    fn ledger(&self, job_id: JobId) -> Result<JobLedger, RepositoryError> {
        let handle = lock(&self.ledgers)?.get(&job_id).cloned();
        match handle {
            Some(handle) => Ok(lock(&handle)?.clone()),
            None => Ok(JobLedger::new(job_id)),
        }
    }

    fn transact<T, E, F>(&self, job_id: JobId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut JobLedger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let handle = self.ledger_handle(job_id)?;
        let mut ledger = lock(&handle)?;

        let checkpoint = ledger.checkpoint();
        match apply(&mut *ledger) {
            Ok(value) => Ok(value),
            Err(err) => {
                ledger.rollback(checkpoint);
                Err(err)
            }
        }
    }
}

impl AnalystDirectory for MemoryAllocationStore {
    fn analysts(&self) -> Result<Vec<AnalystProfile>, RepositoryError> {
        let loads = self.routed_loads()?;
        Ok(lock(&self.analysts)?
            .values()
            .map(|profile| Self::with_routed_load(profile, &loads))
            .collect())
    }

    fn analyst(&self, id: AnalystId) -> Result<Option<AnalystProfile>, RepositoryError> {
        let loads = self.routed_loads()?;
        Ok(lock(&self.analysts)?
            .get(&id)
            .map(|profile| Self::with_routed_load(profile, &loads)))
    }
}

impl JobDirectory for MemoryAllocationStore {
    fn job(&self, id: JobId) -> Result<Option<JobSnapshot>, RepositoryError> {
        Ok(lock(&self.jobs)?.get(&id).cloned())
    }

    fn open_jobs(&self) -> Result<Vec<JobSnapshot>, RepositoryError> {
        Ok(lock(&self.jobs)?.values().cloned().collect())
    }
}
