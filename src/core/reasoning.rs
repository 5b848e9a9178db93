//! Reasoning loop types.
//!
//! A loop is a perpetual ring of six stages. Each executed stage appends one
//! immutable `ReasoningStep`; the loop itself has no terminal state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MnemosyneError;

/// Stage of the reasoning cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopStage {
    Plan,
    Generate,
    Publish,
    Observe,
    Interpret,
    Adapt,
}

impl LoopStage {
    /// All stages in cyclic order.
    pub const ALL: [LoopStage; 6] = [
        LoopStage::Plan,
        LoopStage::Generate,
        LoopStage::Publish,
        LoopStage::Observe,
        LoopStage::Interpret,
        LoopStage::Adapt,
    ];

    /// Position of this stage in the cycle.
    pub fn index(self) -> usize {
        match self {
            Self::Plan => 0,
            Self::Generate => 1,
            Self::Publish => 2,
            Self::Observe => 3,
            Self::Interpret => 4,
            Self::Adapt => 5,
        }
    }

    /// The stage that follows this one, wrapping from ADAPT back to PLAN.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "PLAN",
            Self::Generate => "GENERATE",
            Self::Publish => "PUBLISH",
            Self::Observe => "OBSERVE",
            Self::Interpret => "INTERPRET",
            Self::Adapt => "ADAPT",
        }
    }
}

impl fmt::Display for LoopStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoopStage {
    type Err = MnemosyneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MnemosyneError::invalid_value("stage", format!("unknown stage '{}'", s)))
    }
}

/// Immutable record of one stage's execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningStep {
    pub stage: LoopStage,
    /// What the stage set out to do.
    pub intent: String,
    /// Ids of organizations, narratives, posts, etc. consulted.
    #[serde(default)]
    pub context_used: Vec<String>,
    #[serde(default)]
    pub referenced_insights: Vec<String>,
    /// Assumptions this step is bound to (required at PLAN unless overridden).
    #[serde(default)]
    pub referenced_assumptions: Vec<String>,
    /// Explicit justification for planning without an active assumption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_override_reason: Option<String>,
    /// Strategy change emitted by ADAPT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_change_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,
    pub decisions: Vec<String>,
    pub rationale: String,
    #[serde(default)]
    pub human_approved: bool,
    pub timestamp: DateTime<Utc>,
}

impl ReasoningStep {
    /// Create a step for `stage` recorded now.
    pub fn new(stage: LoopStage, intent: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            stage,
            intent: intent.into(),
            context_used: Vec::new(),
            referenced_insights: Vec::new(),
            referenced_assumptions: Vec::new(),
            memory_override_reason: None,
            strategy_change_id: None,
            hypothesis: None,
            decisions: Vec::new(),
            rationale: rationale.into(),
            human_approved: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_decisions(mut self, decisions: Vec<String>) -> Self {
        self.decisions = decisions;
        self
    }

    pub fn with_context_used(mut self, ids: Vec<String>) -> Self {
        self.context_used = ids;
        self
    }

    pub fn with_references(mut self, insights: Vec<String>, assumptions: Vec<String>) -> Self {
        self.referenced_insights = insights;
        self.referenced_assumptions = assumptions;
        self
    }

    pub fn with_memory_override_reason(mut self, reason: Option<String>) -> Self {
        self.memory_override_reason = reason;
        self
    }

    pub fn with_strategy_change(mut self, id: impl Into<String>) -> Self {
        self.strategy_change_id = Some(id.into());
        self
    }

    pub fn with_hypothesis(mut self, hypothesis: impl Into<String>) -> Self {
        self.hypothesis = Some(hypothesis.into());
        self
    }

    /// Whether the step is bound to an assumption or an explicit override reason.
    pub fn is_evidence_bound(&self) -> bool {
        !self.referenced_assumptions.is_empty()
            || self
                .memory_override_reason
                .as_deref()
                .is_some_and(|r| !r.trim().is_empty())
    }
}

/// The full lifecycle of a strategic decision cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningLoop {
    pub id: String,
    pub org_id: String,
    /// Executed steps, append-only.
    #[serde(default)]
    pub steps: Vec<ReasoningStep>,
    pub current_stage: LoopStage,
}

impl ReasoningLoop {
    /// Start a new loop at PLAN.
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.into(),
            steps: Vec::new(),
            current_stage: LoopStage::Plan,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// The most recently executed step.
    pub fn last_step(&self) -> Option<&ReasoningStep> {
        self.steps.last()
    }

    /// Number of complete PLAN..ADAPT traversals.
    pub fn completed_cycles(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.stage == LoopStage::Adapt)
            .count()
    }
}
