//! Typed per-cycle context handed from stage to stage.
//!
//! The belief snapshot (organization, narrative, insights, assumptions,
//! governance override) is taken once when the cycle starts. Stages then
//! fill in their side-channel outputs: the artifact at GENERATE, comments
//! at OBSERVE, contradictions and pivot data at INTERPRET, and the strategy
//! change at ADAPT.

use serde::Serialize;

use crate::core::{
    Assumption, Insight, InsightContradiction, Narrative, Organization, Override, StrategyChange,
};
use crate::engine::collaborators::{Artifact, Comment, RawFeedback};
use crate::error::{MnemosyneError, Result};
use crate::memory::BeliefStore;

/// The belief behind the first STRONG contradiction of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotSignal {
    pub belief_id: String,
    pub previous_assumption: String,
    pub confidence_from: f64,
    pub confidence_to: f64,
    pub triggering_signals: Vec<String>,
}

/// Everything a stage handler may read or produce during one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleContext {
    pub organization: Option<Organization>,
    pub narrative: Option<Narrative>,
    /// Insights with confidence > 0.
    pub insights: Vec<Insight>,
    /// Assumptions with confidence > 0.
    pub assumptions: Vec<Assumption>,
    /// Governance override in force for this organization, if any.
    pub active_override: Option<Override>,
    /// Caller-supplied justification for planning without memory.
    pub memory_override_reason: Option<String>,

    /// Feedback waiting to be ingested at OBSERVE.
    pub raw_feedback: Vec<RawFeedback>,
    pub artifact: Option<Artifact>,
    pub comments: Vec<Comment>,
    pub contradictions: Vec<InsightContradiction>,
    pub pivot: Option<PivotSignal>,
    pub strategy_change: Option<StrategyChange>,
}

impl CycleContext {
    /// Empty context, for handlers that need no belief snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the store for a cycle run on behalf of `org_id`.
    ///
    /// Fails if the organization is unknown. The narrative is the first
    /// active one for the organization, if any.
    pub fn from_store(store: &BeliefStore, org_id: &str) -> Result<Self> {
        let organization = store
            .get_organization(org_id)
            .cloned()
            .ok_or_else(|| MnemosyneError::not_found("organization", org_id))?;

        let mut context = Self {
            narrative: store.get_active_narrative(org_id).cloned(),
            organization: Some(organization),
            ..Self::default()
        };
        context.refresh_beliefs(store);
        Ok(context)
    }

    /// Re-read beliefs and the governance override after the store changed.
    ///
    /// Organization, narrative and raw feedback are kept.
    pub fn refresh_beliefs(&mut self, store: &BeliefStore) {
        self.insights = store
            .get_insights()
            .into_iter()
            .filter(|i| i.confidence > 0.0)
            .cloned()
            .collect();
        self.assumptions = store
            .get_assumptions()
            .into_iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        if let Some(org) = &self.organization {
            self.active_override = store.get_active_override(&org.id).cloned();
        }
    }

    pub fn with_assumptions(mut self, assumptions: Vec<Assumption>) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn with_insights(mut self, insights: Vec<Insight>) -> Self {
        self.insights = insights;
        self
    }

    pub fn with_memory_override_reason(mut self, reason: impl Into<String>) -> Self {
        self.memory_override_reason = Some(reason.into());
        self
    }

    pub fn with_raw_feedback(mut self, feedback: Vec<RawFeedback>) -> Self {
        self.raw_feedback = feedback;
        self
    }

    /// The reason PLAN may proceed without a bound assumption.
    ///
    /// An explicit caller reason wins over a governance override.
    pub fn override_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .memory_override_reason
            .as_ref()
            .filter(|r| !r.trim().is_empty())
        {
            return Some(reason.clone());
        }
        self.active_override
            .as_ref()
            .map(|o| format!("Governance override {} ({}): {}", o.id, o.authority_level, o.rationale))
    }

    /// Clear the side-channel outputs so the context can drive another cycle.
    pub fn reset_cycle_outputs(&mut self) {
        self.artifact = None;
        self.comments.clear();
        self.contradictions.clear();
        self.pivot = None;
        self.strategy_change = None;
    }

    pub fn assumption(&self, id: &str) -> Option<&Assumption> {
        self.assumptions.iter().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> BeliefStore {
        let mut store = BeliefStore::in_memory();
        store.add_organization(Organization::new("org_1", "Acme", "Ship it"));
        store.add_narrative(Narrative::new("nar_1", "org_1", "Engineers first"));
        store
            .add_assumption(Assumption::new("asm_live", "live").with_confidence(0.5))
            .unwrap();
        store
            .add_assumption(Assumption::new("asm_dead", "dead").with_confidence(0.0))
            .unwrap();
        store
    }

    #[test]
    fn test_from_store_snapshots_active_beliefs() {
        let store = seeded_store();
        let ctx = CycleContext::from_store(&store, "org_1").unwrap();

        assert_eq!(ctx.organization.as_ref().unwrap().id, "org_1");
        assert_eq!(ctx.narrative.as_ref().unwrap().id, "nar_1");
        assert_eq!(ctx.assumptions.len(), 1);
        assert_eq!(ctx.assumptions[0].id, "asm_live");
        assert!(ctx.active_override.is_none());
    }

    #[test]
    fn test_from_store_unknown_org() {
        let store = seeded_store();
        let err = CycleContext::from_store(&store, "org_9").unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_override_reason_precedence() {
        let mut store = seeded_store();
        store
            .add_override(Override::new("org_1", "pause pivots", "launch week", "cmo").with_id("ovr_1"))
            .unwrap();

        let ctx = CycleContext::from_store(&store, "org_1").unwrap();
        assert!(ctx.override_reason().unwrap().contains("ovr_1"));

        let ctx = ctx.with_memory_override_reason("fresh market");
        assert_eq!(ctx.override_reason().unwrap(), "fresh market");

        let blank = CycleContext::new().with_memory_override_reason("   ");
        assert!(blank.override_reason().is_none());
    }

    #[test]
    fn test_reset_cycle_outputs_keeps_snapshot() {
        let store = seeded_store();
        let mut ctx = CycleContext::from_store(&store, "org_1").unwrap();
        ctx.contradictions
            .push(InsightContradiction::new("asm_live", "cmt", "x", 0.1));
        ctx.reset_cycle_outputs();
        assert!(ctx.contradictions.is_empty());
        assert_eq!(ctx.assumptions.len(), 1);
    }
}
