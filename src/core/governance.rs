//! Governance records: human overrides and strategy changes.
//!
//! Both are audit records. Overrides are superseded, never deleted; strategy
//! changes are immutable once emitted at ADAPT.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MnemosyneError, Result};

/// Generate a short prefixed id (`<prefix>_<8 hex chars>`).
pub fn generate_short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..8])
}

/// A human intervention that supersedes system judgment for one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Override {
    /// Unique identifier (`ovr_xxxxxxxx`).
    pub id: String,
    /// Id of the belief, post or plan being overridden.
    pub target_id: String,
    /// Snapshot of the system's state before the override.
    pub previous_state: String,
    /// What the human did instead.
    pub override_action: String,
    /// Why the human overrode the system.
    pub rationale: String,
    /// Who authorized it (role or name).
    pub authority_level: String,
    /// Whether this override is still in force.
    pub active: bool,
    /// When the override was recorded.
    pub created_at: DateTime<Utc>,
}

impl Override {
    /// Create an active override recorded now.
    pub fn new(
        target_id: impl Into<String>,
        override_action: impl Into<String>,
        rationale: impl Into<String>,
        authority_level: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_short_id("ovr"),
            target_id: target_id.into(),
            previous_state: String::new(),
            override_action: override_action.into(),
            rationale: rationale.into(),
            authority_level: authority_level.into(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_previous_state(mut self, previous_state: impl Into<String>) -> Self {
        self.previous_state = previous_state.into();
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Reject overrides that cannot be audited.
    pub fn validate(&self) -> Result<()> {
        if self.target_id.trim().is_empty() {
            return Err(MnemosyneError::invalid_value(
                "target_id",
                "override must name a target",
            ));
        }
        if self.rationale.trim().is_empty() {
            return Err(MnemosyneError::invalid_value(
                "rationale",
                format!("override of {} must carry a rationale", self.target_id),
            ));
        }
        Ok(())
    }
}

/// First-class record of a strategic pivot (or an explicit decision not to pivot).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyChange {
    /// Unique identifier (`sc_xxxxxxxx`).
    pub id: String,
    /// Belief that triggered the change, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight_id: Option<String>,
    /// Assumptions modified by this change.
    #[serde(default)]
    pub related_assumption_ids: Vec<String>,
    /// The belief as it was held before the change.
    pub previous_assumption: String,
    pub triggering_signals: Vec<String>,
    pub confidence_from: f64,
    pub confidence_to: f64,
    pub decision: String,
    pub justification: String,
    pub acknowledged_risks: Vec<String>,
    /// When the decision must be revisited.
    pub review_horizon: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl StrategyChange {
    /// Create a strategy change recorded now, reviewed after `review_in`.
    pub fn new(
        decision: impl Into<String>,
        justification: impl Into<String>,
        confidence_from: f64,
        confidence_to: f64,
        review_in: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_short_id("sc"),
            insight_id: None,
            related_assumption_ids: Vec::new(),
            previous_assumption: String::new(),
            triggering_signals: Vec::new(),
            confidence_from,
            confidence_to,
            decision: decision.into(),
            justification: justification.into(),
            acknowledged_risks: Vec::new(),
            review_horizon: now + review_in,
            timestamp: now,
        }
    }

    pub fn for_belief(mut self, insight_id: impl Into<String>) -> Self {
        self.insight_id = Some(insight_id.into());
        self
    }

    pub fn with_previous_assumption(mut self, statement: impl Into<String>) -> Self {
        self.previous_assumption = statement.into();
        self
    }

    pub fn with_related_assumptions(mut self, ids: Vec<String>) -> Self {
        self.related_assumption_ids = ids;
        self
    }

    pub fn with_triggering_signals(mut self, signals: Vec<String>) -> Self {
        self.triggering_signals = signals;
        self
    }

    pub fn with_acknowledged_risks(mut self, risks: Vec<String>) -> Self {
        self.acknowledged_risks = risks;
        self
    }

    /// Whether this records a "maintain course" decision.
    pub fn is_no_change(&self) -> bool {
        (self.confidence_from - self.confidence_to).abs() < f64::EPSILON
    }
}
