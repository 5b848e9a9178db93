//! Beliefs command for Mnemosyne.
//!
//! Lists assumptions and insights with their confidence and risk.

use serde::Serialize;

use crate::config::Config;
use crate::core::{Assumption, Insight, RiskLevel};
use crate::memory::{BeliefKind, BeliefStore};

/// Options for the beliefs command.
#[derive(Debug, Clone, Default)]
pub struct BeliefsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Show only HIGH-risk assumptions.
    pub at_risk: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// Output format for the beliefs command.
#[derive(Debug, Clone, Serialize)]
pub struct BeliefsOutput {
    /// Whether the listing was successful.
    pub success: bool,
    /// Number of beliefs listed.
    pub count: usize,
    /// The beliefs, least confident first.
    pub beliefs: Vec<BeliefInfo>,
    /// Error message if listing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Simplified belief info for output.
#[derive(Debug, Clone, Serialize)]
pub struct BeliefInfo {
    pub id: String,
    pub kind: BeliefKind,
    /// Assumption statement or insight content.
    pub text: String,
    pub confidence: f64,
    /// Only assumptions carry a risk level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    pub decay_rate: f64,
    /// Date the belief was last touched by decay or contradiction processing.
    pub last_touched: String,
    /// Number of invalidation signals recorded.
    pub signals: usize,
}

impl BeliefInfo {
    pub fn from_assumption(a: &Assumption) -> Self {
        Self {
            id: a.id.clone(),
            kind: BeliefKind::Assumption,
            text: a.statement.clone(),
            confidence: a.current_confidence,
            risk_level: Some(a.risk_level),
            decay_rate: a.decay_rate,
            last_touched: a.last_validated_at.format("%Y-%m-%d").to_string(),
            signals: a.invalidation_signals.len(),
        }
    }

    pub fn from_insight(i: &Insight) -> Self {
        Self {
            id: i.id.clone(),
            kind: BeliefKind::Insight,
            text: i.content.clone(),
            confidence: i.confidence,
            risk_level: None,
            decay_rate: i.decay_rate,
            last_touched: i.last_updated.format("%Y-%m-%d").to_string(),
            signals: 0,
        }
    }
}

impl BeliefsOutput {
    /// Create a successful output.
    pub fn success(beliefs: Vec<BeliefInfo>) -> Self {
        Self {
            success: true,
            count: beliefs.len(),
            beliefs,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            beliefs: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The beliefs command implementation.
pub struct BeliefsCommand {
    store: BeliefStore,
    #[allow(dead_code)]
    config: Config,
}

impl BeliefsCommand {
    /// Create a new beliefs command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// Run the beliefs command.
    pub fn run(&self, options: &BeliefsOptions) -> BeliefsOutput {
        let mut beliefs: Vec<BeliefInfo> = self
            .store
            .get_assumptions()
            .into_iter()
            .map(BeliefInfo::from_assumption)
            .collect();

        if options.at_risk {
            beliefs.retain(|b| b.risk_level == Some(RiskLevel::High));
        } else {
            beliefs.extend(
                self.store
                    .get_insights()
                    .into_iter()
                    .map(BeliefInfo::from_insight),
            );
        }

        beliefs.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

        if let Some(limit) = options.limit {
            beliefs.truncate(limit);
        }

        BeliefsOutput::success(beliefs)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &BeliefsOutput, options: &BeliefsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output, options)
        }
    }

    fn format_human_readable(&self, output: &BeliefsOutput, options: &BeliefsOptions) -> String {
        if !output.success {
            return format!(
                "Beliefs failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if output.beliefs.is_empty() {
            return if options.at_risk {
                "No high-risk assumptions.\n".to_string()
            } else {
                "No beliefs recorded.\n".to_string()
            };
        }

        let mut lines = vec![format!("Found {} belief(s):\n", output.count)];

        for belief in &output.beliefs {
            let risk = belief
                .risk_level
                .map(|r| format!(" [{}]", r))
                .unwrap_or_default();
            let kind = match belief.kind {
                BeliefKind::Assumption => "assumption",
                BeliefKind::Insight => "insight",
            };
            lines.push(format!(
                "{:.2}{} {} ({})",
                belief.confidence, risk, belief.text, kind
            ));
            let signals = if belief.signals > 0 {
                format!(" | {} signal(s)", belief.signals)
            } else {
                String::new()
            };
            lines.push(format!(
                "   ID: {} | Touched: {}{}",
                belief.id, belief.last_touched, signals
            ));
        }

        lines.join("\n") + "\n"
    }
}
