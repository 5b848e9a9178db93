//! Override command for Mnemosyne.
//!
//! Records a human governance override. Any override already active for the
//! same target is superseded but stays in the ledger.

use serde::Serialize;

use crate::cli::persistence_warning;
use crate::config::Config;
use crate::core::Override;
use crate::memory::BeliefStore;

/// Options for the override command.
#[derive(Debug, Clone, Default)]
pub struct OverrideOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// What the human decided instead.
    pub action: String,
    /// Why the system's judgment is being overridden.
    pub rationale: String,
    /// Who authorized it.
    pub authority: String,
    /// Snapshot of the state being overridden. Defaults to the target
    /// belief's current confidence when the target is a known belief.
    pub previous_state: Option<String>,
}

/// Output format for the override command.
#[derive(Debug, Clone, Serialize)]
pub struct OverrideOutput {
    /// Whether the override was recorded.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub target_id: String,
    /// Ids of overrides this one superseded.
    pub superseded: Vec<String>,
    /// Active overrides across all targets after this one.
    pub debt: usize,
    /// Set when the change is held in memory but could not be committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OverrideOutput {
    /// Create a successful output.
    pub fn success(o: &Override, superseded: Vec<String>, debt: usize) -> Self {
        Self {
            success: true,
            id: Some(o.id.clone()),
            target_id: o.target_id.clone(),
            superseded,
            debt,
            warning: None,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(target_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            target_id: target_id.into(),
            superseded: Vec::new(),
            debt: 0,
            warning: None,
            error: Some(error.into()),
        }
    }
}

/// The override command implementation.
pub struct OverrideCommand {
    store: BeliefStore,
    #[allow(dead_code)]
    config: Config,
}

impl OverrideCommand {
    /// Create a new override command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// The underlying store, for inspection after a run.
    pub fn store(&self) -> &BeliefStore {
        &self.store
    }

    /// Run the override command.
    pub fn run(&mut self, target_id: &str, options: &OverrideOptions) -> OverrideOutput {
        let previous_state = options
            .previous_state
            .clone()
            .unwrap_or_else(|| self.snapshot(target_id));
        let o = Override::new(
            target_id,
            options.action.as_str(),
            options.rationale.as_str(),
            options.authority.as_str(),
        )
        .with_previous_state(previous_state);

        let superseded: Vec<String> = self
            .store
            .get_active_override(target_id)
            .map(|prior| prior.id.clone())
            .into_iter()
            .collect();

        if let Err(e) = self.store.add_override(o.clone()) {
            return OverrideOutput::failure(target_id, e.to_string());
        }

        let mut output =
            OverrideOutput::success(&o, superseded, self.store.get_override_debt().len());
        output.warning = persistence_warning(&self.store);
        output
    }

    fn snapshot(&self, target_id: &str) -> String {
        if let Some(a) = self.store.get_assumption(target_id) {
            format!(
                "{} (confidence {:.2}, {} risk)",
                a.statement, a.current_confidence, a.risk_level
            )
        } else if let Some(i) = self.store.get_insight(target_id) {
            format!("{} (confidence {:.2})", i.content, i.confidence)
        } else {
            String::new()
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &OverrideOutput, options: &OverrideOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &OverrideOutput) -> String {
        if !output.success {
            return format!(
                "Override failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = vec![format!(
            "Recorded override {} for {}",
            output.id.as_deref().unwrap_or("?"),
            output.target_id
        )];
        if !output.superseded.is_empty() {
            lines.push(format!("  Superseded: {}", output.superseded.join(", ")));
        }
        lines.push(format!("  Override debt: {} active", output.debt));
        if let Some(warning) = &output.warning {
            lines.push(format!("Warning: {}", warning));
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Assumption;

    fn options(action: &str) -> OverrideOptions {
        OverrideOptions {
            action: action.to_string(),
            rationale: "launch week".to_string(),
            authority: "cmo".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_override_snapshots_known_belief() {
        let mut store = BeliefStore::in_memory();
        store
            .add_assumption(Assumption::new("asm_1", "Memes convert").with_confidence(0.3))
            .unwrap();
        let mut cmd = OverrideCommand::new(store, Config::default());

        let output = cmd.run("asm_1", &options("keep memes"));

        assert!(output.success);
        assert_eq!(output.debt, 1);
        let active = cmd.store().get_active_override("asm_1").unwrap();
        assert_eq!(active.previous_state, "Memes convert (confidence 0.30, HIGH risk)");
        assert_eq!(Some(active.id.clone()), output.id);
    }

    #[test]
    fn test_override_supersedes_prior() {
        let mut cmd = OverrideCommand::new(BeliefStore::in_memory(), Config::default());
        let first = cmd.run("org_1", &options("pause pivots"));
        let second = cmd.run("org_1", &options("resume pivots"));

        assert_eq!(second.superseded, vec![first.id.unwrap()]);
        assert_eq!(second.debt, 1);
        assert_eq!(
            cmd.store().get_active_override("org_1").unwrap().override_action,
            "resume pivots"
        );
    }

    #[test]
    fn test_override_explicit_previous_state() {
        let mut cmd = OverrideCommand::new(BeliefStore::in_memory(), Config::default());
        let mut opts = options("hold");
        opts.previous_state = Some("pivot queued".to_string());
        cmd.run("org_1", &opts);
        assert_eq!(
            cmd.store().get_active_override("org_1").unwrap().previous_state,
            "pivot queued"
        );
    }

    #[test]
    fn test_override_requires_rationale() {
        let mut cmd = OverrideCommand::new(BeliefStore::in_memory(), Config::default());
        let mut opts = options("hold");
        opts.rationale = " ".to_string();

        let output = cmd.run("org_1", &opts);

        assert!(!output.success);
        assert!(cmd.store().get_override_debt().is_empty());
        assert!(cmd
            .format_output(&output, &opts)
            .starts_with("Override failed:"));
    }
}
