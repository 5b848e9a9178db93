//! Batched contradiction processing with a per-cycle safety rail.
//!
//! Processing order for one batch:
//! 1. Validate every event (nothing is applied if any is malformed)
//! 2. Append all events verbatim to the contradiction log
//! 3. Group by target id and sum the deltas
//! 4. Assumptions: drop by at most [`MAX_DROP_PER_CYCLE`], note the cap in
//!    the invalidation signals, then one signal line per event
//! 5. Insights: subtract the full sum
//!
//! Insights predate the safety rail and are exempt from it. Existing insight
//! histories were recorded uncapped, and applying the cap now would make
//! their trajectories diverge from the log.
//!
//! Events for unknown targets are logged but change no belief.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::InsightContradiction;
use crate::error::Result;
use crate::memory::decay::BeliefKind;
use crate::storage::MemoryState;

/// Maximum confidence an assumption may lose in one processing cycle.
pub const MAX_DROP_PER_CYCLE: f64 = 0.20;

/// Contradictions for one target within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ContradictionGroup<'a> {
    pub target_id: &'a str,
    pub events: Vec<&'a InsightContradiction>,
}

impl ContradictionGroup<'_> {
    /// Sum of all deltas in the group.
    pub fn total_drop(&self) -> f64 {
        self.events.iter().map(|e| e.confidence_delta).sum()
    }
}

/// Group a batch by target id, keeping first-seen order.
pub fn group_by_target(batch: &[InsightContradiction]) -> Vec<ContradictionGroup<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<ContradictionGroup<'_>> = Vec::new();

    for event in batch {
        match index.get(event.insight_id.as_str()) {
            Some(&i) => groups[i].events.push(event),
            None => {
                index.insert(event.insight_id.as_str(), groups.len());
                groups.push(ContradictionGroup {
                    target_id: &event.insight_id,
                    events: vec![event],
                });
            }
        }
    }

    groups
}

/// Clamp a summed drop to the per-cycle maximum. Returns `(applied, capped)`.
pub fn cap_drop(total: f64) -> (f64, bool) {
    if total > MAX_DROP_PER_CYCLE {
        (MAX_DROP_PER_CYCLE, true)
    } else {
        (total, false)
    }
}

/// Invalidation-signal line recording a cap event.
pub fn safety_rail_signal(events: usize, calculated: f64) -> String {
    format!(
        "SAFETY RAIL: {} contradictions totaling -{:.2} capped to -{:.2} this cycle",
        events, calculated, MAX_DROP_PER_CYCLE
    )
}

/// What a batch did to one belief.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeliefUpdate {
    pub target_id: String,
    pub kind: BeliefKind,
    pub events: usize,
    pub calculated_drop: f64,
    pub applied_drop: f64,
    pub capped: bool,
    pub confidence_before: f64,
    pub confidence_after: f64,
}

/// Outcome of processing one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Events appended to the contradiction log.
    pub logged: usize,
    pub updates: Vec<BeliefUpdate>,
    /// Target ids that matched no assumption or insight.
    pub unmatched: Vec<String>,
}

impl BatchReport {
    /// Updates where the safety rail fired.
    pub fn capped(&self) -> impl Iterator<Item = &BeliefUpdate> {
        self.updates.iter().filter(|u| u.capped)
    }

    pub fn update_for(&self, target_id: &str) -> Option<&BeliefUpdate> {
        self.updates.iter().find(|u| u.target_id == target_id)
    }
}

/// Apply a batch to `state`. Validation happens before any mutation.
pub fn apply_batch(
    state: &mut MemoryState,
    batch: Vec<InsightContradiction>,
    now: DateTime<Utc>,
) -> Result<BatchReport> {
    for event in &batch {
        event.validate()?;
    }

    let mut report = BatchReport {
        logged: batch.len(),
        ..BatchReport::default()
    };

    for group in group_by_target(&batch) {
        let total = group.total_drop();

        if let Some(assumption) = state.assumptions.get_mut(group.target_id) {
            let (applied, capped) = cap_drop(total);
            let before = assumption.current_confidence;

            assumption.set_confidence(before - applied);
            assumption.last_validated_at = now;

            if capped {
                tracing::info!(
                    "safety rail capped drop for {}: calculated {:.2}, applied {:.2}",
                    group.target_id,
                    total,
                    applied
                );
                assumption
                    .invalidation_signals
                    .push(safety_rail_signal(group.events.len(), total));
            }
            assumption
                .invalidation_signals
                .extend(group.events.iter().map(|e| e.signal_text()));

            report.updates.push(BeliefUpdate {
                target_id: group.target_id.to_string(),
                kind: BeliefKind::Assumption,
                events: group.events.len(),
                calculated_drop: total,
                applied_drop: applied,
                capped,
                confidence_before: before,
                confidence_after: assumption.current_confidence,
            });
        } else if let Some(insight) = state.insights.get_mut(group.target_id) {
            let before = insight.confidence;
            insight.confidence = (before - total).max(0.0);
            insight.last_updated = now;

            report.updates.push(BeliefUpdate {
                target_id: group.target_id.to_string(),
                kind: BeliefKind::Insight,
                events: group.events.len(),
                calculated_drop: total,
                applied_drop: before - insight.confidence,
                capped: false,
                confidence_before: before,
                confidence_after: insight.confidence,
            });
        } else {
            tracing::warn!(
                "{} contradiction(s) logged for unknown belief {}",
                group.events.len(),
                group.target_id
            );
            report.unmatched.push(group.target_id.to_string());
        }
    }

    state.contradictions.extend(batch);
    Ok(report)
}
