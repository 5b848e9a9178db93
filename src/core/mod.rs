//! Core types for Mnemosyne.
//!
//! This module contains the belief entities, governance records, the
//! reasoning loop types and the organization/narrative context they refer to.

pub mod belief;
pub mod governance;
pub mod organization;
pub mod reasoning;

pub use belief::{
    Assumption, Insight, InsightContradiction, LinkStrength, RiskLevel, DEFAULT_DECAY_RATE,
    HIGH_RISK_BELOW, MEDIUM_RISK_BELOW,
};
pub use governance::{generate_short_id, Override, StrategyChange};
pub use organization::{Narrative, Organization};
pub use reasoning::{LoopStage, ReasoningLoop, ReasoningStep};
