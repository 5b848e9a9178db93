//! Belief entities: assumptions, legacy insights and contradiction events.
//!
//! Confidence fields on these types are mutated only by the belief store
//! (decay and contradiction processing). Everything else treats them as
//! read-only snapshots.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MnemosyneError, Result};

/// Default per-day linear decay rate for new beliefs.
pub const DEFAULT_DECAY_RATE: f64 = 0.01;

/// Confidence below which an assumption is HIGH risk.
pub const HIGH_RISK_BELOW: f64 = 0.4;

/// Confidence below which an assumption is MEDIUM risk.
pub const MEDIUM_RISK_BELOW: f64 = 0.7;

/// Risk level of an assumption, derived from its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Confidence >= 0.7.
    #[default]
    Low,
    /// Confidence in [0.4, 0.7).
    Medium,
    /// Confidence < 0.4.
    High,
}

impl RiskLevel {
    /// Derive the risk level for a confidence value.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < HIGH_RISK_BELOW {
            Self::High
        } else if confidence < MEDIUM_RISK_BELOW {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.write_str(label)
    }
}

/// How strongly a piece of feedback is linked to the belief it contradicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStrength {
    Weak,
    Moderate,
    Strong,
}

impl LinkStrength {
    /// Upper-case label used in invalidation signals and decisions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Weak => "WEAK",
            Self::Moderate => "MODERATE",
            Self::Strong => "STRONG",
        }
    }
}

impl fmt::Display for LinkStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An active bet the system is making, with associated risk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assumption {
    /// Unique identifier.
    pub id: String,
    /// The claim being held.
    pub statement: String,
    /// Insight ids backing this assumption (referential only).
    #[serde(default)]
    pub supporting_insights: BTreeSet<String>,
    /// Confidence in [0, 1].
    pub current_confidence: f64,
    /// Risk derived from `current_confidence`.
    pub risk_level: RiskLevel,
    /// Last time confidence was touched by decay or contradiction processing.
    pub last_validated_at: DateTime<Utc>,
    /// When the assumption was created.
    pub created_at: DateTime<Utc>,
    /// Linear confidence decay per elapsed day.
    pub decay_rate: f64,
    /// Ordered, human-readable log of what has weakened this assumption.
    #[serde(default)]
    pub invalidation_signals: Vec<String>,
    /// Pre-computed semantic embedding of `statement`, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Assumption {
    /// Create an assumption at full confidence.
    pub fn new(id: impl Into<String>, statement: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            statement: statement.into(),
            supporting_insights: BTreeSet::new(),
            current_confidence: 1.0,
            risk_level: RiskLevel::Low,
            last_validated_at: now,
            created_at: now,
            decay_rate: DEFAULT_DECAY_RATE,
            invalidation_signals: Vec::new(),
            embedding: None,
        }
    }

    /// Set the starting confidence (clamped to [0, 1]) and derive risk.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.set_confidence(confidence);
        self
    }

    /// Set the per-day decay rate.
    pub fn with_decay_rate(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    /// Set both timestamps (creation and last validation).
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.last_validated_at = at;
        self
    }

    /// Attach supporting insight ids.
    pub fn with_supporting_insights<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supporting_insights = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Seed the invalidation signal log.
    pub fn with_invalidation_signals(mut self, signals: Vec<String>) -> Self {
        self.invalidation_signals = signals;
        self
    }

    /// Attach a pre-computed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set confidence, clamp it to [0, 1] and recompute risk.
    pub fn set_confidence(&mut self, confidence: f64) {
        self.current_confidence = confidence.clamp(0.0, 1.0);
        self.refresh_risk();
    }

    /// Recompute `risk_level` from `current_confidence`.
    pub fn refresh_risk(&mut self) {
        self.risk_level = RiskLevel::from_confidence(self.current_confidence);
    }

    /// Whether PLAN may bind to this assumption.
    pub fn is_active(&self) -> bool {
        self.current_confidence > 0.0
    }

    /// Reject values that would break the store's invariants.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;
        validate_unit("current_confidence", self.current_confidence)?;
        validate_rate(self.decay_rate)
    }
}

/// A strategic belief derived from interpretations (legacy parallel entity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    /// Unique identifier.
    pub id: String,
    /// The belief text.
    pub content: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Loops that produced this insight.
    #[serde(default)]
    pub source_loop_ids: Vec<String>,
    /// When the insight was created.
    pub created_at: DateTime<Utc>,
    /// Last time confidence was touched.
    pub last_updated: DateTime<Utc>,
    /// Linear confidence decay per elapsed day.
    pub decay_rate: f64,
}

impl Insight {
    /// Create an insight at full confidence.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            confidence: 1.0,
            source_loop_ids: Vec::new(),
            created_at: now,
            last_updated: now,
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_decay_rate(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.last_updated = at;
        self
    }

    pub fn with_source_loops(mut self, loop_ids: Vec<String>) -> Self {
        self.source_loop_ids = loop_ids;
        self
    }

    /// Reject values that would break the store's invariants.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;
        validate_unit("confidence", self.confidence)?;
        validate_rate(self.decay_rate)
    }
}

/// An event where new data opposes an assumption or insight.
///
/// Immutable once created; the contradiction log is append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightContradiction {
    /// Target belief id (assumption or insight).
    pub insight_id: String,
    /// Where the evidence came from (comment id, loop id, ...).
    pub source_id: String,
    /// Why this counts as a contradiction.
    pub rationale: String,
    /// Positive magnitude to subtract from the target's confidence.
    pub confidence_delta: f64,
    /// When the evidence was observed.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_strength: Option<LinkStrength>,
    /// Similarity score in [0, 1] that produced `link_strength`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
}

impl InsightContradiction {
    /// Create a contradiction observed now.
    pub fn new(
        insight_id: impl Into<String>,
        source_id: impl Into<String>,
        rationale: impl Into<String>,
        confidence_delta: f64,
    ) -> Self {
        Self {
            insight_id: insight_id.into(),
            source_id: source_id.into(),
            rationale: rationale.into(),
            confidence_delta,
            timestamp: Utc::now(),
            link_strength: None,
            semantic_score: None,
        }
    }

    /// Set the observation time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Record the semantic link that produced this contradiction.
    pub fn with_link(mut self, strength: LinkStrength, score: f64) -> Self {
        self.link_strength = Some(strength);
        self.semantic_score = Some(score);
        self
    }

    /// Reject negative or non-finite deltas and out-of-range scores.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.insight_id)?;
        if !self.confidence_delta.is_finite() || self.confidence_delta < 0.0 {
            return Err(MnemosyneError::invalid_value(
                "confidence_delta",
                format!(
                    "{} for {} must be a finite, non-negative magnitude",
                    self.confidence_delta, self.insight_id
                ),
            ));
        }
        if let Some(score) = self.semantic_score {
            validate_unit("semantic_score", score)?;
        }
        Ok(())
    }

    /// Invalidation-signal line describing this event.
    pub fn signal_text(&self) -> String {
        match self.link_strength {
            Some(strength) => format!(
                "[{}] {} (source: {}, -{:.2})",
                strength, self.rationale, self.source_id, self.confidence_delta
            ),
            None => format!(
                "{} (source: {}, -{:.2})",
                self.rationale, self.source_id, self.confidence_delta
            ),
        }
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(MnemosyneError::invalid_value("id", "must not be empty"));
    }
    Ok(())
}

fn validate_unit(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(MnemosyneError::invalid_value(
            field,
            format!("{} is outside [0, 1]", value),
        ));
    }
    Ok(())
}

fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(MnemosyneError::invalid_value(
            "decay_rate",
            format!("{} must be a finite, non-negative rate", rate),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_confidence(1.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_confidence(0.7), RiskLevel::Low);
        assert_eq!(RiskLevel::from_confidence(0.69), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_confidence(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_confidence(0.39), RiskLevel::High);
        assert_eq!(RiskLevel::from_confidence(0.0), RiskLevel::High);
    }

    #[test]
    fn test_with_confidence_clamps_and_derives_risk() {
        let a = Assumption::new("asm_1", "Engineers trust engineers").with_confidence(1.4);
        assert_eq!(a.current_confidence, 1.0);
        assert_eq!(a.risk_level, RiskLevel::Low);

        let a = a.with_confidence(0.3);
        assert_eq!(a.risk_level, RiskLevel::High);

        let a = a.with_confidence(-0.2);
        assert_eq!(a.current_confidence, 0.0);
        assert!(!a.is_active());
    }

    #[test]
    fn test_assumption_validate_rejects_bad_values() {
        let mut a = Assumption::new("asm_1", "x");
        assert!(a.validate().is_ok());

        a.current_confidence = f64::NAN;
        assert!(a.validate().is_err());

        let a = Assumption::new("asm_1", "x").with_decay_rate(-0.1);
        assert!(a.validate().is_err());

        let a = Assumption::new("  ", "x");
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_contradiction_validate() {
        let c = InsightContradiction::new("asm_1", "cmt_1", "too messy", 0.1);
        assert!(c.validate().is_ok());

        let c = InsightContradiction::new("asm_1", "cmt_1", "too messy", -0.1);
        assert!(c.validate().is_err());

        let c = InsightContradiction::new("asm_1", "cmt_1", "too messy", 0.1)
            .with_link(LinkStrength::Weak, 1.3);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_signal_text_includes_link_label() {
        let c = InsightContradiction::new("asm_1", "cmt_9", "Feels staged", 0.15)
            .with_link(LinkStrength::Strong, 0.72);
        let text = c.signal_text();
        assert!(text.starts_with("[STRONG] Feels staged"));
        assert!(text.contains("cmt_9"));

        let plain = InsightContradiction::new("asm_1", "cmt_9", "Feels staged", 0.15);
        assert!(!plain.signal_text().contains('['));
    }

    #[test]
    fn test_assumption_serde_roundtrip_keeps_optional_fields() {
        let a = Assumption::new("asm_1", "x")
            .with_supporting_insights(["ins_1", "ins_2"])
            .with_embedding(vec![0.1, 0.2]);
        let json = serde_json::to_string(&a).unwrap();
        let parsed: Assumption = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, a);
        assert_eq!(parsed.supporting_insights.len(), 2);
    }

    #[test]
    fn test_contradiction_omits_absent_link() {
        let c = InsightContradiction::new("asm_1", "cmt_1", "x", 0.1);
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("link_strength"));
        assert!(!json.contains("semantic_score"));
    }
}
