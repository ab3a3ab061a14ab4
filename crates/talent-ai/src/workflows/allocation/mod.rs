//! Analyst allocation: versioned weighting configuration, analyst scoring and ranking, the
//! decision audit log, and capacity-aware round-robin distribution of candidate applications.
//!
//! Every component talks to persistence through the traits in [`repository`];
//! [`MemoryAllocationStore`] implements all of them for the API binary and the tests.

pub mod distribution;
pub mod domain;
pub mod flow;
pub mod memory;
pub mod ranking;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod weighting;

#[cfg(test)]
mod tests;

pub use distribution::{
    DistributionError, DistributionService, JobLedger, LedgerCheckpoint, ReleaseOutcome,
    RemovalReport, RoutingOutcome,
};
pub use domain::{
    AllocationDecision, AnalystId, AnalystProfile, AnalystScore, AssignmentId, AssignmentKind,
    CandidateAssignmentEvent, CandidateId, ClientEngagement, ClientId, DecisionId, DecisionType,
    EventId, JobAnalystAssignment, JobId, JobSnapshot, OverrideReason, QueuedCandidate,
    ScoreBand, UrgencyTier, UserId,
};
pub use flow::{AllocationFlow, FlowError, FlowStage};
pub use memory::MemoryAllocationStore;
pub use ranking::{
    is_override, rank_scores, DecisionError, DecisionRequest, RankingError, RankingOutcome,
    RankingService, RankingSettings,
};
pub use repository::{
    AllocationNotice, AllocationStore, AnalystDirectory, AssignmentRepository,
    ConfigurationRepository, DecisionDraft, DecisionLog, JobDirectory, JustificationProvider,
    NoJustification, NotificationDispatcher, NotifyError, ProviderError, RepositoryError,
};
pub use router::allocation_router;
pub use scoring::{prioritize, score, JobPriority, ScoringEngine};
pub use service::{AllocationService, AllocationServiceError, AppliedDecision, JobPrioritization};
pub use weighting::{
    ConfigChange, ConfigKind, ConfigurationStore, DistributionConfig, DistributionWeights,
    FieldViolation, PrioritizationConfig, PrioritizationWeights, ScoreThresholds, StoredConfig,
    UrgencyMultipliers, WeightingError, WeightingProfile,
};
