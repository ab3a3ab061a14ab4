use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Open requisition identifier.
    JobId
);
numeric_id!(
    /// Recruiting analyst identifier.
    AnalystId
);
numeric_id!(ClientId);
numeric_id!(
    /// Candidate application identifier, unique within a job.
    CandidateId
);
numeric_id!(AssignmentId);
numeric_id!(DecisionId);
numeric_id!(EventId);

/// Operator performing a change. Kept opaque; user management lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commercial urgency tier negotiated with the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyTier {
    pub const fn label(self) -> &'static str {
        match self {
            UrgencyTier::Low => "low",
            UrgencyTier::Medium => "medium",
            UrgencyTier::High => "high",
            UrgencyTier::Critical => "critical",
        }
    }
}

/// Snapshot of a job requisition as supplied by the job directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub title: String,
    pub client_id: ClientId,
    #[serde(default)]
    pub client_vip: bool,
    pub required_stack: Vec<String>,
    pub opened_on: NaiveDate,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// Expected billing for the placement, in whole currency units.
    #[serde(default)]
    pub billing_value: u32,
    pub urgency: UrgencyTier,
}

/// Prior work an analyst delivered for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEngagement {
    pub client_id: ClientId,
    pub successful_placements: u32,
}

/// Read-only performance snapshot provided by the analyst directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystProfile {
    pub id: AnalystId,
    pub name: String,
    pub specialization_tags: Vec<String>,
    #[serde(default)]
    pub client_engagements: Vec<ClientEngagement>,
    pub active_candidates: u32,
    /// Personal ceiling; `None` falls back to the configured default capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
    pub approved_submissions: u32,
    pub total_submissions: u32,
    /// Mean hours to first response on a submission; `None` when never measured.
    #[serde(default)]
    pub mean_response_hours: Option<f64>,
}

impl AnalystProfile {
    pub fn successful_engagements_with(&self, client_id: ClientId) -> u32 {
        self.client_engagements
            .iter()
            .filter(|engagement| engagement.client_id == client_id)
            .map(|engagement| engagement.successful_placements)
            .sum()
    }
}

/// Qualitative band derived from the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Regular,
    Critical,
}

impl ScoreBand {
    pub const fn label(self) -> &'static str {
        match self {
            ScoreBand::Excellent => "excellent",
            ScoreBand::Good => "good",
            ScoreBand::Regular => "regular",
            ScoreBand::Critical => "critical",
        }
    }
}

/// Compatibility of one analyst with one job. Recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystScore {
    pub analyst_id: AnalystId,
    pub analyst_name: String,
    pub specialization: u8,
    pub client_fit: u8,
    pub load: u8,
    pub approval_rate: u8,
    pub speed: u8,
    pub total: u8,
    pub weighted_fit: u8,
    pub band: ScoreBand,
    pub current_load: u32,
    pub capacity: u32,
    pub justification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
}

/// Durable row attaching an analyst to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAnalystAssignment {
    pub id: AssignmentId,
    pub job_id: JobId,
    pub analyst_id: AnalystId,
    pub active: bool,
    pub alternation_order: u32,
    pub max_candidates: Option<u32>,
    pub assigned_count: u32,
    pub distribution_percentage: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
}

impl JobAnalystAssignment {
    /// Attached rows are the ones not soft-deleted; they may still be paused.
    pub fn is_attached(&self) -> bool {
        self.removed_at.is_none()
    }

    pub fn has_capacity(&self) -> bool {
        match self.max_candidates {
            Some(max) => self.assigned_count < max,
            None => true,
        }
    }

    /// Eligible for automatic routing.
    pub fn accepts_candidates(&self) -> bool {
        self.is_attached() && self.active && self.has_capacity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Automatic,
    Manual,
    Redistribution,
}

impl AssignmentKind {
    pub const fn label(self) -> &'static str {
        match self {
            AssignmentKind::Automatic => "automatic",
            AssignmentKind::Manual => "manual",
            AssignmentKind::Redistribution => "redistribution",
        }
    }
}

/// Immutable history row recording where a candidate application was routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAssignmentEvent {
    pub id: EventId,
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub assignment_id: AssignmentId,
    pub analyst_id: AnalystId,
    pub kind: AssignmentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_analyst: Option<AnalystId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<UserId>,
    pub assigned_at: DateTime<Utc>,
}

/// Candidate waiting for capacity on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedCandidate {
    pub candidate_id: CandidateId,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_analyst: Option<AnalystId>,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    AiAccepted,
    ManualOverride,
}

impl DecisionType {
    pub const fn label(self) -> &'static str {
        match self {
            DecisionType::AiAccepted => "ai_accepted",
            DecisionType::ManualOverride => "manual_override",
        }
    }
}

/// Category an operator picks when departing from the ranked suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideReason {
    #[serde(rename = "balanceamento_carga")]
    WorkloadBalance,
    #[serde(rename = "especializacao_tecnica")]
    TechnicalExpertise,
    #[serde(rename = "relacionamento_cliente")]
    ClientRelationship,
    #[serde(rename = "disponibilidade")]
    Availability,
    #[serde(rename = "desempenho_historico")]
    TrackRecord,
    #[serde(rename = "other")]
    Other,
}

impl OverrideReason {
    pub const ALL: [OverrideReason; 6] = [
        OverrideReason::WorkloadBalance,
        OverrideReason::TechnicalExpertise,
        OverrideReason::ClientRelationship,
        OverrideReason::Availability,
        OverrideReason::TrackRecord,
        OverrideReason::Other,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            OverrideReason::WorkloadBalance => "balanceamento_carga",
            OverrideReason::TechnicalExpertise => "especializacao_tecnica",
            OverrideReason::ClientRelationship => "relacionamento_cliente",
            OverrideReason::Availability => "disponibilidade",
            OverrideReason::TrackRecord => "desempenho_historico",
            OverrideReason::Other => "other",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|reason| reason.code().eq_ignore_ascii_case(code))
    }
}

/// Append-only audit row for a ranking decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDecision {
    pub id: DecisionId,
    pub job_id: JobId,
    pub suggested: Vec<AnalystId>,
    pub chosen: Vec<AnalystId>,
    pub decision_type: DecisionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<OverrideReason>,
    pub decided_at: DateTime<Utc>,
    pub decided_by: UserId,
}
