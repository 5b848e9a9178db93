//! Debt command for Mnemosyne.
//!
//! Lists the override debt: every human override still in force. With
//! `resolve`, retires one override first.

use serde::Serialize;

use crate::cli::persistence_warning;
use crate::config::Config;
use crate::core::Override;
use crate::memory::BeliefStore;

/// Options for the debt command.
#[derive(Debug, Clone, Default)]
pub struct DebtOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Override id to resolve before listing.
    pub resolve: Option<String>,
}

/// Output format for the debt command.
#[derive(Debug, Clone, Serialize)]
pub struct DebtOutput {
    pub success: bool,
    pub count: usize,
    /// Active overrides, oldest first.
    pub overrides: Vec<Override>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DebtOutput {
    /// Create a successful output.
    pub fn success(overrides: Vec<Override>, resolved: Option<String>) -> Self {
        Self {
            success: true,
            count: overrides.len(),
            overrides,
            resolved,
            warning: None,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            overrides: Vec::new(),
            resolved: None,
            warning: None,
            error: Some(error.into()),
        }
    }
}

/// The debt command implementation.
pub struct DebtCommand {
    store: BeliefStore,
    #[allow(dead_code)]
    config: Config,
}

impl DebtCommand {
    /// Create a new debt command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// The underlying store, for inspection after a run.
    pub fn store(&self) -> &BeliefStore {
        &self.store
    }

    /// Run the debt command.
    pub fn run(&mut self, options: &DebtOptions) -> DebtOutput {
        if let Some(id) = &options.resolve {
            if let Err(e) = self.store.resolve_override(id) {
                return DebtOutput::failure(e.to_string());
            }
        }

        let mut overrides: Vec<Override> =
            self.store.get_override_debt().into_iter().cloned().collect();
        overrides.sort_by_key(|o| o.created_at);

        let mut output = DebtOutput::success(overrides, options.resolve.clone());
        output.warning = persistence_warning(&self.store);
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &DebtOutput, options: &DebtOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &DebtOutput) -> String {
        if !output.success {
            return format!(
                "Debt failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        if let Some(id) = &output.resolved {
            lines.push(format!("Resolved override {}.", id));
        }

        if output.overrides.is_empty() {
            lines.push("No override debt.".to_string());
        } else {
            lines.push(format!("Override debt: {} active\n", output.count));
            for o in &output.overrides {
                lines.push(format!("{} -> {}", o.target_id, o.override_action));
                lines.push(format!("   Why: {}", o.rationale));
                lines.push(format!(
                    "   By: {} on {} | ID: {}",
                    o.authority_level,
                    o.created_at.format("%Y-%m-%d"),
                    o.id
                ));
            }
        }
        if let Some(warning) = &output.warning {
            lines.push(format!("Warning: {}", warning));
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn store_with_overrides() -> BeliefStore {
        let now = Utc::now();
        let mut store = BeliefStore::in_memory();
        store
            .add_override(
                Override::new("org_1", "pause pivots", "launch week", "cmo")
                    .with_id("ovr_old")
                    .at(now - Duration::days(3)),
            )
            .unwrap();
        store
            .add_override(
                Override::new("org_1", "resume pivots", "launch over", "cmo")
                    .with_id("ovr_new")
                    .at(now - Duration::days(1)),
            )
            .unwrap();
        store
            .add_override(
                Override::new("asm_1", "keep memes", "brand bet", "ceo")
                    .with_id("ovr_asm")
                    .at(now - Duration::days(2)),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_debt_lists_only_active_oldest_first() {
        let mut cmd = DebtCommand::new(store_with_overrides(), Config::default());
        let output = cmd.run(&DebtOptions::default());

        assert!(output.success);
        let ids: Vec<&str> = output.overrides.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["ovr_asm", "ovr_new"]);

        let human = cmd.format_output(&output, &DebtOptions::default());
        assert!(human.contains("Override debt: 2 active"));
        assert!(human.contains("asm_1 -> keep memes"));
    }

    #[test]
    fn test_debt_resolve() {
        let mut cmd = DebtCommand::new(store_with_overrides(), Config::default());
        let options = DebtOptions {
            resolve: Some("ovr_asm".to_string()),
            ..Default::default()
        };

        let output = cmd.run(&options);

        assert!(output.success);
        assert_eq!(output.count, 1);
        assert!(cmd.store().get_active_override("asm_1").is_none());
        assert!(cmd
            .format_output(&output, &options)
            .starts_with("Resolved override ovr_asm."));
    }

    #[test]
    fn test_debt_resolve_unknown() {
        let mut cmd = DebtCommand::new(store_with_overrides(), Config::default());
        let options = DebtOptions {
            resolve: Some("ovr_nope".to_string()),
            ..Default::default()
        };
        let output = cmd.run(&options);
        assert!(!output.success);
        assert!(output.error.unwrap().contains("ovr_nope"));
    }

    #[test]
    fn test_debt_empty() {
        let mut cmd = DebtCommand::new(BeliefStore::in_memory(), Config::default());
        let output = cmd.run(&DebtOptions::default());
        assert_eq!(
            cmd.format_output(&output, &DebtOptions::default()),
            "No override debt.\n"
        );
    }
}
