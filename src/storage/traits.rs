//! Storage traits and the persisted collection set.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    Assumption, Insight, InsightContradiction, Narrative, Organization, Override, ReasoningLoop,
    StrategyChange,
};
use crate::error::Result;

/// Every collection the belief store owns.
///
/// Mapping collections are keyed by entity id; log collections are ordered
/// and append-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryState {
    pub organizations: BTreeMap<String, Organization>,
    pub narratives: BTreeMap<String, Narrative>,
    pub loops: BTreeMap<String, ReasoningLoop>,
    pub insights: BTreeMap<String, Insight>,
    pub assumptions: BTreeMap<String, Assumption>,
    pub contradictions: Vec<InsightContradiction>,
    pub strategy_changes: Vec<StrategyChange>,
    pub overrides: Vec<Override>,
}

impl MemoryState {
    /// Total number of records across all collections.
    pub fn record_count(&self) -> usize {
        self.organizations.len()
            + self.narratives.len()
            + self.loops.len()
            + self.insights.len()
            + self.assumptions.len()
            + self.contradictions.len()
            + self.strategy_changes.len()
            + self.overrides.len()
    }
}

/// Trait for belief-memory persistence backends.
///
/// `commit` must be all-or-nothing: after a failed or interrupted commit,
/// `load` returns the previously committed state, never a mix.
pub trait MemoryStore: Send + Sync {
    /// Load the last committed state. A store that has never been written
    /// returns an empty state.
    fn load(&self) -> Result<MemoryState>;

    /// Persist the complete state as one logical change.
    fn commit(&self, state: &MemoryState) -> Result<()>;
}

/// Blanket implementation of MemoryStore for Arc-wrapped stores.
///
/// Lets tests keep a handle on the store they hand to a `BeliefStore`.
impl<T: MemoryStore + ?Sized> MemoryStore for Arc<T> {
    fn load(&self) -> Result<MemoryState> {
        (**self).load()
    }

    fn commit(&self, state: &MemoryState) -> Result<()> {
        (**self).commit(state)
    }
}
