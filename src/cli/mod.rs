//! CLI commands for Mnemosyne.
//!
//! This module provides CLI commands for Mnemosyne, organized into:
//! - **Belief commands**: beliefs, assume, contradict, decay
//! - **Governance commands**: override, debt
//! - **Loop commands**: cycle
//! - **Analytics commands**: trajectory

// Belief commands
pub mod assume;
pub mod beliefs;
pub mod contradict;
pub mod decay;

// Governance commands
pub mod debt;
pub mod override_cmd;

// Loop commands
pub mod cycle;

// Analytics commands
pub mod trajectory;

pub use assume::AssumeCommand;
pub use beliefs::BeliefsCommand;
pub use contradict::ContradictCommand;
pub use cycle::CycleCommand;
pub use debt::DebtCommand;
pub use decay::DecayCommand;
pub use override_cmd::OverrideCommand;
pub use trajectory::TrajectoryCommand;

use crate::memory::BeliefStore;

/// Warning text for a mutation that is held in memory but not committed.
pub(crate) fn persistence_warning(store: &BeliefStore) -> Option<String> {
    let health = store.persistence_health();
    if health.is_healthy() {
        return None;
    }
    Some(format!(
        "change not persisted ({})",
        health.last_error.as_deref().unwrap_or("unknown storage error")
    ))
}
