//! The belief store: sole owner and mutator of belief state.
//!
//! `BeliefStore` holds every persisted collection in memory and commits the
//! whole state through a [`MemoryStore`] after each mutating call. Commit
//! failures never reach the caller: they are logged with `tracing::error!`
//! and recorded in [`PersistenceHealth`], and the store keeps serving its
//! in-memory state. `flush` retries an outstanding commit explicitly.
//!
//! All mutators take `&mut self`. Share a store across threads through
//! [`SharedBeliefStore`].

pub mod contradiction;
pub mod decay;
pub mod governance;

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::{TemporalAnalyzer, TrajectoryReport};
use crate::core::{
    Assumption, Insight, InsightContradiction, Narrative, Organization, Override, ReasoningLoop,
    StrategyChange,
};
use crate::error::{MnemosyneError, Result};
use crate::storage::{InMemoryStore, MemoryState, MemoryStore};

pub use contradiction::{
    apply_batch, cap_drop, group_by_target, safety_rail_signal, BatchReport, BeliefUpdate,
    ContradictionGroup, MAX_DROP_PER_CYCLE,
};
pub use decay::{BeliefKind, DecayReport, DecayedBelief};

/// A belief store behind the single-writer lock.
pub type SharedBeliefStore = Arc<Mutex<BeliefStore>>;

/// Persistence health, the observability hook for fail-open commits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistenceHealth {
    /// Commits (and loads) that failed since the store was opened.
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// In-memory state differs from what was last committed.
    pub dirty: bool,
}

impl PersistenceHealth {
    pub fn is_healthy(&self) -> bool {
        !self.dirty
    }

    fn record_failure(&mut self, err: &MnemosyneError) {
        self.failures += 1;
        self.last_error = Some(err.to_string());
        self.last_failure_at = Some(Utc::now());
        self.dirty = true;
    }

    fn record_success(&mut self) {
        self.last_success_at = Some(Utc::now());
        self.dirty = false;
    }
}

/// Owner of assumptions, insights, the contradiction log, strategy changes,
/// overrides, loops and the organization context.
pub struct BeliefStore {
    state: MemoryState,
    backend: Box<dyn MemoryStore>,
    health: PersistenceHealth,
    analyzer: TemporalAnalyzer,
}

impl fmt::Debug for BeliefStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeliefStore")
            .field("assumptions", &self.state.assumptions.len())
            .field("insights", &self.state.insights.len())
            .field("contradictions", &self.state.contradictions.len())
            .field("overrides", &self.state.overrides.len())
            .field("health", &self.health)
            .finish()
    }
}

impl BeliefStore {
    /// Open a store over `backend`, starting empty if the load fails.
    pub fn open(backend: impl MemoryStore + 'static) -> Self {
        let mut health = PersistenceHealth::default();
        let state = match backend.load() {
            Ok(state) => state,
            Err(err) => {
                tracing::error!("failed to load belief memory, starting empty: {}", err);
                health.record_failure(&err);
                MemoryState::default()
            }
        };

        Self {
            state,
            backend: Box::new(backend),
            health,
            analyzer: TemporalAnalyzer::new(),
        }
    }

    /// Open a store over `backend`, propagating load failures.
    pub fn try_open(backend: impl MemoryStore + 'static) -> Result<Self> {
        let state = backend.load()?;
        Ok(Self {
            state,
            backend: Box::new(backend),
            health: PersistenceHealth::default(),
            analyzer: TemporalAnalyzer::new(),
        })
    }

    /// A store backed by a fresh [`InMemoryStore`].
    pub fn in_memory() -> Self {
        Self::open(InMemoryStore::new())
    }

    /// Wrap this store for shared use.
    pub fn into_shared(self) -> SharedBeliefStore {
        Arc::new(Mutex::new(self))
    }

    /// Read-only view of every collection.
    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    pub fn persistence_health(&self) -> &PersistenceHealth {
        &self.health
    }

    /// Commit the current state, surfacing any error to the caller.
    pub fn flush(&mut self) -> Result<()> {
        match self.backend.commit(&self.state) {
            Ok(()) => {
                self.health.record_success();
                Ok(())
            }
            Err(err) => {
                self.health.record_failure(&err);
                Err(err)
            }
        }
    }

    fn persist(&mut self) {
        if let Err(err) = self.backend.commit(&self.state) {
            tracing::error!(
                "belief memory commit failed, continuing in memory (failures: {}): {}",
                self.health.failures + 1,
                err
            );
            self.health.record_failure(&err);
        } else {
            self.health.record_success();
        }
    }

    // Organizations and narratives

    pub fn add_organization(&mut self, organization: Organization) {
        self.state
            .organizations
            .insert(organization.id.clone(), organization);
        self.persist();
    }

    pub fn get_organization(&self, id: &str) -> Option<&Organization> {
        self.state.organizations.get(id)
    }

    pub fn add_narrative(&mut self, narrative: Narrative) {
        self.state.narratives.insert(narrative.id.clone(), narrative);
        self.persist();
    }

    /// First active narrative for an organization.
    pub fn get_active_narrative(&self, org_id: &str) -> Option<&Narrative> {
        self.state
            .narratives
            .values()
            .find(|n| n.org_id == org_id && n.active)
    }

    // Beliefs

    /// Insert or replace an assumption. Risk is re-derived from confidence.
    pub fn add_assumption(&mut self, mut assumption: Assumption) -> Result<()> {
        assumption.validate()?;
        assumption.refresh_risk();
        self.state
            .assumptions
            .insert(assumption.id.clone(), assumption);
        self.persist();
        Ok(())
    }

    pub fn get_assumption(&self, id: &str) -> Option<&Assumption> {
        self.state.assumptions.get(id)
    }

    pub fn get_assumptions(&self) -> Vec<&Assumption> {
        self.state.assumptions.values().collect()
    }

    /// Insert or replace an insight.
    pub fn add_insight(&mut self, insight: Insight) -> Result<()> {
        insight.validate()?;
        self.state.insights.insert(insight.id.clone(), insight);
        self.persist();
        Ok(())
    }

    pub fn get_insight(&self, id: &str) -> Option<&Insight> {
        self.state.insights.get(id)
    }

    pub fn get_insights(&self) -> Vec<&Insight> {
        self.state.insights.values().collect()
    }

    // Decay

    /// Apply time-based decay to every belief as of `now`.
    pub fn apply_decay(&mut self, now: DateTime<Utc>) -> DecayReport {
        let mut report = DecayReport {
            evaluated_at: Some(now),
            ..DecayReport::default()
        };

        for assumption in self.state.assumptions.values_mut() {
            let risk_before = assumption.risk_level;
            if let Some(outcome) = decay::decay_assumption(assumption, now) {
                if assumption.risk_level != risk_before {
                    report.risk_changes.push((
                        assumption.id.clone(),
                        risk_before,
                        assumption.risk_level,
                    ));
                }
                report.decayed.push(outcome);
            }
        }
        for insight in self.state.insights.values_mut() {
            if let Some(outcome) = decay::decay_insight(insight, now) {
                report.decayed.push(outcome);
            }
        }

        if !report.is_empty() {
            tracing::debug!("decay touched {} belief(s)", report.decayed.len());
            self.persist();
        }
        report
    }

    /// [`apply_decay`](Self::apply_decay) at the current time.
    pub fn apply_decay_now(&mut self) -> DecayReport {
        self.apply_decay(Utc::now())
    }

    // Contradictions

    /// Process one batch of contradictions with the per-cycle safety rail.
    ///
    /// The batch is applied to a working copy that replaces the live state
    /// only once every group has been processed. A malformed event rejects
    /// the whole batch.
    pub fn process_batch(&mut self, batch: Vec<InsightContradiction>) -> Result<BatchReport> {
        self.process_batch_at(batch, Utc::now())
    }

    /// [`process_batch`](Self::process_batch) with an explicit processing time.
    pub fn process_batch_at(
        &mut self,
        batch: Vec<InsightContradiction>,
        now: DateTime<Utc>,
    ) -> Result<BatchReport> {
        if batch.is_empty() {
            return Ok(BatchReport::default());
        }

        let mut working = self.state.clone();
        let report = apply_batch(&mut working, batch, now)?;
        self.state = working;
        self.persist();
        Ok(report)
    }

    /// Single-event convenience for [`process_batch`](Self::process_batch).
    pub fn record_contradiction(&mut self, contradiction: InsightContradiction) -> Result<BatchReport> {
        self.process_batch(vec![contradiction])
    }

    /// Contradiction log entries for one belief, oldest first.
    pub fn contradictions_for(&self, target_id: &str) -> Vec<&InsightContradiction> {
        self.state
            .contradictions
            .iter()
            .filter(|c| c.insight_id == target_id)
            .collect()
    }

    // Strategy changes

    pub fn add_strategy_change(&mut self, change: StrategyChange) {
        self.state.strategy_changes.push(change);
        self.persist();
    }

    /// Strategy changes in chronological order, optionally for one belief.
    pub fn get_strategy_changes(&self, insight_id: Option<&str>) -> Vec<&StrategyChange> {
        let mut changes: Vec<&StrategyChange> = self
            .state
            .strategy_changes
            .iter()
            .filter(|sc| match insight_id {
                Some(id) => sc.insight_id.as_deref() == Some(id),
                None => true,
            })
            .collect();
        changes.sort_by_key(|sc| sc.timestamp);
        changes
    }

    // Loops

    pub fn store_loop(&mut self, reasoning_loop: &ReasoningLoop) {
        self.state
            .loops
            .insert(reasoning_loop.id.clone(), reasoning_loop.clone());
        self.persist();
    }

    pub fn get_loop(&self, id: &str) -> Option<&ReasoningLoop> {
        self.state.loops.get(id)
    }

    // Governance

    /// Record an override, superseding any active override for the same target.
    pub fn add_override(&mut self, o: Override) -> Result<()> {
        let target = o.target_id.clone();
        let superseded = governance::supersede_and_insert(&mut self.state.overrides, o)?;
        if !superseded.is_empty() {
            tracing::info!(
                "override for {} supersedes {}",
                target,
                superseded.join(", ")
            );
        }
        self.persist();
        Ok(())
    }

    pub fn get_active_override(&self, target_id: &str) -> Option<&Override> {
        governance::active_override(&self.state.overrides, target_id)
    }

    /// Every override still in force, across all targets.
    pub fn get_override_debt(&self) -> Vec<&Override> {
        governance::override_debt(&self.state.overrides)
    }

    /// Deactivate one override without replacing it.
    pub fn resolve_override(&mut self, override_id: &str) -> Result<()> {
        governance::resolve(&mut self.state.overrides, override_id)?;
        self.persist();
        Ok(())
    }

    // Analytics

    /// Reconstruct the confidence trajectory of an assumption or insight.
    pub fn belief_trajectory(
        &self,
        id: &str,
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> Result<TrajectoryReport> {
        let (confidence, created_at) = if let Some(a) = self.get_assumption(id) {
            (a.current_confidence, a.created_at)
        } else if let Some(i) = self.get_insight(id) {
            (i.confidence, i.created_at)
        } else {
            return Err(MnemosyneError::not_found("belief", id));
        };

        Ok(self.analyzer.analyze(
            confidence,
            created_at,
            self.contradictions_for(id),
            lookback_days,
            now,
        ))
    }
}
