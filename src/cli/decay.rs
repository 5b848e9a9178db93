//! Decay command for Mnemosyne.
//!
//! Applies time-based confidence decay to every belief as of now.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::persistence_warning;
use crate::config::Config;
use crate::memory::{BeliefStore, DecayReport};

/// Options for the decay command.
#[derive(Debug, Clone, Default)]
pub struct DecayOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the decay command.
#[derive(Debug, Clone, Serialize)]
pub struct DecayOutput {
    /// Whether decay ran.
    pub success: bool,
    #[serde(flatten)]
    pub report: DecayReport,
    /// Set when the change is held in memory but could not be committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecayOutput {
    /// Create a successful output.
    pub fn success(report: DecayReport) -> Self {
        Self {
            success: true,
            report,
            warning: None,
            error: None,
        }
    }
}

/// The decay command implementation.
pub struct DecayCommand {
    store: BeliefStore,
    #[allow(dead_code)]
    config: Config,
}

impl DecayCommand {
    /// Create a new decay command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// The underlying store, for inspection after a run.
    pub fn store(&self) -> &BeliefStore {
        &self.store
    }

    /// Run the decay command at the current time.
    pub fn run(&mut self, options: &DecayOptions) -> DecayOutput {
        self.run_at(Utc::now(), options)
    }

    /// Run the decay command as of `now`.
    pub fn run_at(&mut self, now: DateTime<Utc>, _options: &DecayOptions) -> DecayOutput {
        let report = self.store.apply_decay(now);
        let mut output = DecayOutput::success(report);
        output.warning = persistence_warning(&self.store);
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &DecayOutput, options: &DecayOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &DecayOutput) -> String {
        let report = &output.report;
        if report.is_empty() {
            return "No beliefs decayed.\n".to_string();
        }

        let mut lines = vec![format!("Decayed {} belief(s):", report.decayed.len())];
        for belief in &report.decayed {
            lines.push(format!(
                "  {}: {:.2} -> {:.2} over {}d",
                belief.id, belief.confidence_before, belief.confidence_after, belief.days_elapsed
            ));
        }
        for (id, from, to) in &report.risk_changes {
            lines.push(format!("  Risk for {}: {} -> {}", id, from, to));
        }
        if let Some(warning) = &output.warning {
            lines.push(format!("Warning: {}", warning));
        }

        lines.join("\n") + "\n"
    }
}
