//! Contradict command for Mnemosyne.
//!
//! Reads a JSON array of contradiction events and processes it as one batch,
//! subject to the per-cycle safety rail.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cli::persistence_warning;
use crate::config::Config;
use crate::core::{InsightContradiction, LinkStrength};
use crate::error::Result;
use crate::memory::{BatchReport, BeliefStore, MAX_DROP_PER_CYCLE};
use crate::util::read_json_file;

/// Options for the contradict command.
#[derive(Debug, Clone, Default)]
pub struct ContradictOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// One contradiction event as written in the input file.
///
/// `timestamp` defaults to the time of processing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContradictionInput {
    pub insight_id: String,
    #[serde(default = "default_source")]
    pub source_id: String,
    pub rationale: String,
    pub confidence_delta: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub link_strength: Option<LinkStrength>,
    #[serde(default)]
    pub semantic_score: Option<f64>,
}

fn default_source() -> String {
    "cli".to_string()
}

impl ContradictionInput {
    fn into_event(self, now: DateTime<Utc>) -> InsightContradiction {
        let mut event =
            InsightContradiction::new(self.insight_id, self.source_id, self.rationale, self.confidence_delta)
                .at(self.timestamp.unwrap_or(now));
        event.link_strength = self.link_strength;
        event.semantic_score = self.semantic_score;
        event
    }
}

/// Output format for the contradict command.
#[derive(Debug, Clone, Serialize)]
pub struct ContradictOutput {
    /// Whether the batch was processed.
    pub success: bool,
    /// Per-cycle cap in force.
    pub max_drop_per_cycle: f64,
    #[serde(flatten)]
    pub report: BatchReport,
    /// Set when the change is held in memory but could not be committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Error message if processing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContradictOutput {
    /// Create a successful output.
    pub fn success(report: BatchReport) -> Self {
        Self {
            success: true,
            max_drop_per_cycle: MAX_DROP_PER_CYCLE,
            report,
            warning: None,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            max_drop_per_cycle: MAX_DROP_PER_CYCLE,
            report: BatchReport::default(),
            warning: None,
            error: Some(error.into()),
        }
    }
}

/// The contradict command implementation.
pub struct ContradictCommand {
    store: BeliefStore,
    #[allow(dead_code)]
    config: Config,
}

impl ContradictCommand {
    /// Create a new contradict command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// The underlying store, for inspection after a run.
    pub fn store(&self) -> &BeliefStore {
        &self.store
    }

    /// Run the contradict command against a JSON file.
    pub fn run(&mut self, path: &Path, _options: &ContradictOptions) -> ContradictOutput {
        match read_json_file::<Vec<ContradictionInput>>(path) {
            Ok(inputs) => self.run_batch(inputs),
            Err(e) => ContradictOutput::failure(e.to_string()),
        }
    }

    /// Process already-parsed events as one batch.
    pub fn run_batch(&mut self, inputs: Vec<ContradictionInput>) -> ContradictOutput {
        match self.process(inputs) {
            Ok(report) => {
                let mut output = ContradictOutput::success(report);
                output.warning = persistence_warning(&self.store);
                output
            }
            Err(e) => ContradictOutput::failure(e.to_string()),
        }
    }

    fn process(&mut self, inputs: Vec<ContradictionInput>) -> Result<BatchReport> {
        let now = Utc::now();
        let batch = inputs.into_iter().map(|i| i.into_event(now)).collect();
        self.store.process_batch_at(batch, now)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ContradictOutput, options: &ContradictOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &ContradictOutput) -> String {
        if !output.success {
            return format!(
                "Contradict failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let report = &output.report;
        if report.logged == 0 {
            return "No contradictions in batch.\n".to_string();
        }

        let mut lines = vec![format!("Logged {} contradiction(s).", report.logged)];

        for update in &report.updates {
            let rail = if update.capped {
                format!(
                    " (SAFETY RAIL: -{:.2} capped to -{:.2})",
                    update.calculated_drop, update.applied_drop
                )
            } else {
                String::new()
            };
            lines.push(format!(
                "  {}: {:.2} -> {:.2}{}",
                update.target_id, update.confidence_before, update.confidence_after, rail
            ));
        }

        if !report.unmatched.is_empty() {
            lines.push(format!(
                "  No belief matched: {}",
                report.unmatched.join(", ")
            ));
        }
        if let Some(warning) = &output.warning {
            lines.push(format!("Warning: {}", warning));
        }

        lines.join("\n") + "\n"
    }
}
