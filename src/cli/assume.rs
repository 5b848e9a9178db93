//! Assume command for Mnemosyne.
//!
//! Records a new assumption (or replaces one with the same id).

use serde::Serialize;

use crate::cli::persistence_warning;
use crate::config::Config;
use crate::core::{Assumption, RiskLevel};
use crate::memory::BeliefStore;

/// Options for the assume command.
#[derive(Debug, Clone, Default)]
pub struct AssumeOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Starting confidence (default: 1.0).
    pub confidence: Option<f64>,
    /// Per-day decay rate (default: `memory.default_decay_rate`).
    pub decay_rate: Option<f64>,
    /// Pre-computed embedding of the statement, for semantic linking.
    pub embedding: Option<Vec<f32>>,
}

/// Output format for the assume command.
#[derive(Debug, Clone, Serialize)]
pub struct AssumeOutput {
    /// Whether the assumption was recorded.
    pub success: bool,
    pub id: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    /// An assumption with this id existed and was replaced.
    pub replaced: bool,
    /// Set when the change is held in memory but could not be committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Error message if recording failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssumeOutput {
    /// Create a successful output.
    pub fn success(assumption: &Assumption, replaced: bool) -> Self {
        Self {
            success: true,
            id: assumption.id.clone(),
            confidence: assumption.current_confidence,
            risk_level: Some(assumption.risk_level),
            replaced,
            warning: None,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            id: id.into(),
            confidence: 0.0,
            risk_level: None,
            replaced: false,
            warning: None,
            error: Some(error.into()),
        }
    }
}

/// The assume command implementation.
pub struct AssumeCommand {
    store: BeliefStore,
    config: Config,
}

impl AssumeCommand {
    /// Create a new assume command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// The underlying store, for inspection after a run.
    pub fn store(&self) -> &BeliefStore {
        &self.store
    }

    /// Run the assume command.
    pub fn run(&mut self, id: &str, statement: &str, options: &AssumeOptions) -> AssumeOutput {
        if statement.trim().is_empty() {
            return AssumeOutput::failure(id, "statement must not be empty");
        }

        let mut assumption = Assumption::new(id, statement)
            .with_decay_rate(
                options
                    .decay_rate
                    .unwrap_or(self.config.memory.default_decay_rate),
            );
        // Unclamped so that out-of-range input is rejected rather than coerced
        if let Some(confidence) = options.confidence {
            assumption.current_confidence = confidence;
        }
        if let Some(embedding) = &options.embedding {
            assumption = assumption.with_embedding(embedding.clone());
        }

        let replaced = self.store.get_assumption(id).is_some();
        if let Err(e) = self.store.add_assumption(assumption) {
            return AssumeOutput::failure(id, e.to_string());
        }

        let mut output = match self.store.get_assumption(id) {
            Some(stored) => AssumeOutput::success(stored, replaced),
            None => AssumeOutput::failure(id, "assumption vanished after insert"),
        };
        output.warning = persistence_warning(&self.store);
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &AssumeOutput, options: &AssumeOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &AssumeOutput) -> String {
        if !output.success {
            return format!(
                "Assume failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let verb = if output.replaced { "Replaced" } else { "Recorded" };
        let risk = output
            .risk_level
            .map(|r| r.to_string())
            .unwrap_or_default();
        let mut text = format!(
            "{} assumption {} at confidence {:.2} ({} risk)\n",
            verb, output.id, output.confidence, risk
        );
        if let Some(warning) = &output.warning {
            text.push_str(&format!("Warning: {}\n", warning));
        }
        text
    }
}
