use std::fmt;

use serde::Serialize;

use super::domain::{AllocationDecision, AnalystId, JobId, UserId};
use super::ranking::{is_override, DecisionRequest, RankingOutcome};

/// Step of the allocation review an operator is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    Ranking,
    ManualSelection,
    Confirmation,
    Recorded,
}

impl FlowStage {
    pub const fn label(self) -> &'static str {
        match self {
            FlowStage::Ranking => "ranking",
            FlowStage::ManualSelection => "manual selection",
            FlowStage::Confirmation => "confirmation",
            FlowStage::Recorded => "recorded",
        }
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("cannot {action} during {stage}")]
    InvalidTransition {
        stage: FlowStage,
        action: &'static str,
    },
    #[error("no ranking has been presented yet")]
    NoRanking,
    #[error("ranking for job {found} presented to the flow of job {expected}")]
    JobMismatch { expected: JobId, found: JobId },
    #[error("analyst {0} is not part of the ranking")]
    UnknownAnalyst(AnalystId),
    #[error("select at least one analyst")]
    EmptySelection,
    #[error("choosing analysts outside the suggestion requires an override reason")]
    MissingOverrideReason,
}

/// Operator-facing review of a ranking, from the suggestion to the recorded decision.
///
/// The flow only shapes the [`DecisionRequest`]; persisting it is the caller's job, after which
/// [`AllocationFlow::recorded`] closes the flow.
#[derive(Debug, Clone)]
pub struct AllocationFlow {
    job_id: JobId,
    actor: UserId,
    stage: FlowStage,
    outcome: Option<RankingOutcome>,
    selection: Vec<AnalystId>,
    manual: bool,
    decision: Option<AllocationDecision>,
}

impl AllocationFlow {
    pub fn new(job_id: JobId, actor: UserId) -> Self {
        Self {
            job_id,
            actor,
            stage: FlowStage::Ranking,
            outcome: None,
            selection: Vec::new(),
            manual: false,
            decision: None,
        }
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn selection(&self) -> &[AnalystId] {
        &self.selection
    }

    pub fn outcome(&self) -> Option<&RankingOutcome> {
        self.outcome.as_ref()
    }

    pub fn decision(&self) -> Option<&AllocationDecision> {
        self.decision.as_ref()
    }

    fn expect_stage(&self, stage: FlowStage, action: &'static str) -> Result<(), FlowError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                stage: self.stage,
                action,
            })
        }
    }

    fn ranking(&self) -> Result<&RankingOutcome, FlowError> {
        self.outcome.as_ref().ok_or(FlowError::NoRanking)
    }

    /// Show a (new) ranking. Resets any selection made against a previous one.
    pub fn present(&mut self, outcome: RankingOutcome) -> Result<(), FlowError> {
        self.expect_stage(FlowStage::Ranking, "present a ranking")?;
        if outcome.job_id != self.job_id {
            return Err(FlowError::JobMismatch {
                expected: self.job_id,
                found: outcome.job_id,
            });
        }
        self.selection = outcome.suggested.clone();
        self.manual = false;
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn accept_suggestion(&mut self) -> Result<(), FlowError> {
        self.expect_stage(FlowStage::Ranking, "accept the suggestion")?;
        let suggested = self.ranking()?.suggested.clone();
        if suggested.is_empty() {
            return Err(FlowError::EmptySelection);
        }
        self.selection = suggested;
        self.manual = false;
        self.stage = FlowStage::Confirmation;
        Ok(())
    }

    /// Start editing; the suggestion is the initial selection.
    pub fn begin_manual_selection(&mut self) -> Result<(), FlowError> {
        self.expect_stage(FlowStage::Ranking, "select analysts manually")?;
        self.selection = self.ranking()?.suggested.clone();
        self.manual = true;
        self.stage = FlowStage::ManualSelection;
        Ok(())
    }

    /// Flip an analyst in or out of the selection; returns whether it is now selected.
    pub fn toggle(&mut self, analyst_id: AnalystId) -> Result<bool, FlowError> {
        self.expect_stage(FlowStage::ManualSelection, "change the selection")?;
        let ranked = self
            .ranking()?
            .scores
            .iter()
            .any(|score| score.analyst_id == analyst_id);
        if !ranked {
            return Err(FlowError::UnknownAnalyst(analyst_id));
        }

        match self.selection.iter().position(|id| *id == analyst_id) {
            Some(index) => {
                self.selection.remove(index);
                Ok(false)
            }
            None => {
                self.selection.push(analyst_id);
                Ok(true)
            }
        }
    }

    pub fn review(&mut self) -> Result<(), FlowError> {
        self.expect_stage(FlowStage::ManualSelection, "review the selection")?;
        if self.selection.is_empty() {
            return Err(FlowError::EmptySelection);
        }
        self.stage = FlowStage::Confirmation;
        Ok(())
    }

    /// Ranked analysts the current selection is compared against.
    fn compared_ranking(&self) -> Result<Vec<AnalystId>, FlowError> {
        let outcome = self.ranking()?;
        Ok(outcome.top(self.selection.len().max(outcome.suggested.len())))
    }

    pub fn requires_override_reason(&self) -> bool {
        self.compared_ranking()
            .map(|ranked| is_override(&ranked, &self.selection))
            .unwrap_or(false)
    }

    /// Build the decision to record. The flow stays on confirmation until
    /// [`AllocationFlow::recorded`] is called.
    pub fn confirm(
        &self,
        justification: Option<String>,
        override_reason: Option<String>,
    ) -> Result<DecisionRequest, FlowError> {
        self.expect_stage(FlowStage::Confirmation, "confirm")?;
        let suggested = self.compared_ranking()?;

        let override_reason = override_reason.filter(|code| !code.trim().is_empty());
        if is_override(&suggested, &self.selection) && override_reason.is_none() {
            return Err(FlowError::MissingOverrideReason);
        }

        Ok(DecisionRequest {
            job_id: self.job_id,
            suggested,
            chosen: self.selection.clone(),
            actor: self.actor.clone(),
            justification,
            override_reason,
        })
    }

    pub fn recorded(&mut self, decision: AllocationDecision) -> Result<(), FlowError> {
        self.expect_stage(FlowStage::Confirmation, "record a decision")?;
        if decision.job_id != self.job_id {
            return Err(FlowError::JobMismatch {
                expected: self.job_id,
                found: decision.job_id,
            });
        }
        self.decision = Some(decision);
        self.stage = FlowStage::Recorded;
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), FlowError> {
        self.stage = match self.stage {
            FlowStage::ManualSelection => FlowStage::Ranking,
            FlowStage::Confirmation if self.manual => FlowStage::ManualSelection,
            FlowStage::Confirmation => FlowStage::Ranking,
            stage @ (FlowStage::Ranking | FlowStage::Recorded) => {
                return Err(FlowError::InvalidTransition {
                    stage,
                    action: "go back",
                })
            }
        };
        Ok(())
    }
}
