//! Time-based confidence decay for beliefs.
//!
//! Decay logic:
//! 1. days_elapsed = whole days since the belief was last touched
//! 2. If days_elapsed > 0, subtract `days_elapsed * decay_rate`, floored at 0
//! 3. Stamp the belief as touched at `now`
//!
//! Because the stamp moves to `now`, running decay twice at the same instant
//! changes nothing the second time. Fractional days are dropped on each pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{Assumption, Insight, RiskLevel};

/// Which kind of belief was decayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeliefKind {
    Assumption,
    Insight,
}

/// One belief whose confidence moved during a decay pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecayedBelief {
    pub id: String,
    pub kind: BeliefKind,
    pub days_elapsed: i64,
    pub confidence_before: f64,
    pub confidence_after: f64,
}

/// Summary of a decay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecayReport {
    pub evaluated_at: Option<DateTime<Utc>>,
    pub decayed: Vec<DecayedBelief>,
    /// Assumptions whose risk level changed as a result.
    pub risk_changes: Vec<(String, RiskLevel, RiskLevel)>,
}

impl DecayReport {
    pub fn is_empty(&self) -> bool {
        self.decayed.is_empty()
    }
}

/// Whole days between `last` and `now`, rounded down. Negative if `last` is in the future.
pub fn days_elapsed(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last).num_days()
}

/// Confidence after `days` of linear decay at `rate`, floored at 0.
pub fn decayed_confidence(confidence: f64, rate: f64, days: i64) -> f64 {
    (confidence - days as f64 * rate).max(0.0)
}

/// Decay a single assumption in place.
///
/// Returns `None` when less than a whole day has passed.
pub fn decay_assumption(assumption: &mut Assumption, now: DateTime<Utc>) -> Option<DecayedBelief> {
    let days = days_elapsed(assumption.last_validated_at, now);
    if days <= 0 {
        return None;
    }

    let before = assumption.current_confidence;
    assumption.set_confidence(decayed_confidence(before, assumption.decay_rate, days));
    assumption.last_validated_at = now;

    Some(DecayedBelief {
        id: assumption.id.clone(),
        kind: BeliefKind::Assumption,
        days_elapsed: days,
        confidence_before: before,
        confidence_after: assumption.current_confidence,
    })
}

/// Decay a single insight in place.
pub fn decay_insight(insight: &mut Insight, now: DateTime<Utc>) -> Option<DecayedBelief> {
    let days = days_elapsed(insight.last_updated, now);
    if days <= 0 {
        return None;
    }

    let before = insight.confidence;
    insight.confidence = decayed_confidence(before, insight.decay_rate, days);
    insight.last_updated = now;

    Some(DecayedBelief {
        id: insight.id.clone(),
        kind: BeliefKind::Insight,
        days_elapsed: days,
        confidence_before: before,
        confidence_after: insight.confidence,
    })
}
