//! Mnemosyne - belief-state memory for strategic content decisions
//!
//! Mnemosyne keeps a confidence-scored set of assumptions and insights,
//! decays them over time, weakens them from batches of contradictions under
//! a per-cycle safety rail, and records human overrides as auditable debt.
//! A six-stage reasoning loop (PLAN, GENERATE, PUBLISH, OBSERVE, INTERPRET,
//! ADAPT) reads that memory and writes its pivots back through the store.

pub mod analytics;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod memory;
pub mod storage;
pub mod util;

pub use analytics::{TemporalAnalyzer, TrajectoryMetrics, TrajectoryReport, TrajectoryStatus};
pub use config::Config;
pub use core::{
    Assumption, Insight, InsightContradiction, LinkStrength, LoopStage, Narrative, Organization,
    Override, ReasoningLoop, ReasoningStep, RiskLevel, StrategyChange,
};
pub use engine::{
    reference_orchestrator, CycleContext, CycleOutcome, CycleRunner, LoopOrchestrator,
    StageHandler,
};
pub use error::{MnemosyneError, Result};
pub use memory::{
    BatchReport, BeliefStore, DecayReport, PersistenceHealth, SharedBeliefStore,
    MAX_DROP_PER_CYCLE,
};
pub use storage::{FileMemoryStore, InMemoryStore, MemoryStore};

// CLI commands
pub use cli::{
    AssumeCommand, BeliefsCommand, ContradictCommand, CycleCommand, DebtCommand, DecayCommand,
    OverrideCommand, TrajectoryCommand,
};
