//! Trajectory command for Mnemosyne.
//!
//! Reconstructs a belief's confidence history from the contradiction log and
//! reports its volatility, momentum and status.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::TrajectoryReport;
use crate::config::{Config, TemporalConfig};
use crate::memory::BeliefStore;

/// Options for the trajectory command.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Window to analyze (default: `temporal.default_lookback_days`).
    pub lookback_days: Option<u32>,
}

/// Output format for the trajectory command.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryOutput {
    pub success: bool,
    pub belief_id: String,
    #[serde(flatten)]
    pub report: Option<TrajectoryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrajectoryOutput {
    /// Create a successful output.
    pub fn success(belief_id: impl Into<String>, report: TrajectoryReport) -> Self {
        Self {
            success: true,
            belief_id: belief_id.into(),
            report: Some(report),
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(belief_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            belief_id: belief_id.into(),
            report: None,
            error: Some(error.into()),
        }
    }
}

/// The trajectory command implementation.
pub struct TrajectoryCommand {
    store: BeliefStore,
    config: Config,
}

impl TrajectoryCommand {
    /// Create a new trajectory command.
    pub fn new(store: BeliefStore, config: Config) -> Self {
        Self { store, config }
    }

    /// Run the trajectory command at the current time.
    pub fn run(&self, belief_id: &str, options: &TrajectoryOptions) -> TrajectoryOutput {
        self.run_at(belief_id, Utc::now(), options)
    }

    /// Run the trajectory command as of `now`.
    pub fn run_at(
        &self,
        belief_id: &str,
        now: DateTime<Utc>,
        options: &TrajectoryOptions,
    ) -> TrajectoryOutput {
        let lookback = options
            .lookback_days
            .unwrap_or(self.config.temporal.default_lookback_days);
        if !TemporalConfig::is_valid_lookback(lookback) {
            return TrajectoryOutput::failure(
                belief_id,
                format!("lookback of {} days is outside 1-3650", lookback),
            );
        }

        match self.store.belief_trajectory(belief_id, lookback, now) {
            Ok(report) => TrajectoryOutput::success(belief_id, report),
            Err(e) => TrajectoryOutput::failure(belief_id, e.to_string()),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &TrajectoryOutput, options: &TrajectoryOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &TrajectoryOutput) -> String {
        let report = match (&output.report, output.success) {
            (Some(report), true) => report,
            _ => {
                return format!(
                    "Trajectory failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                )
            }
        };

        let metrics = &report.metrics;
        let mut lines = vec![
            format!(
                "{}: {} over the last {} day(s)",
                output.belief_id,
                metrics.status_label(),
                report.lookback_days
            ),
            format!(
                "   Volatility: {:.3} | Momentum: {:+.3}/day | Events: {} | Age: {}d",
                metrics.volatility_score,
                metrics.momentum_score,
                report.events_considered,
                report.belief_age_days
            ),
            String::new(),
        ];

        for point in &report.trajectory {
            lines.push(format!(
                "   {}  {:.2}  {}",
                point.timestamp.format("%Y-%m-%d %H:%M"),
                point.confidence,
                point.event_description
            ));
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::TrajectoryStatus;
    use crate::core::{Assumption, InsightContradiction};
    use chrono::Duration;

    fn hit_store(now: DateTime<Utc>) -> BeliefStore {
        let mut store = BeliefStore::in_memory();
        store
            .add_assumption(
                Assumption::new("asm_1", "Employee voices build trust")
                    .with_created_at(now - Duration::days(20)),
            )
            .unwrap();
        for days_ago in [2, 1] {
            let at = now - Duration::days(days_ago);
            store
                .process_batch_at(
                    vec![InsightContradiction::new("asm_1", "cmt", "staged posts", 0.15).at(at)],
                    at,
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_trajectory_recent_hits_are_degrading() {
        let now = Utc::now();
        let cmd = TrajectoryCommand::new(hit_store(now), Config::default());

        let output = cmd.run_at("asm_1", now, &TrajectoryOptions::default());

        assert!(output.success);
        let report = output.report.as_ref().unwrap();
        assert_eq!(report.lookback_days, 30);
        assert_eq!(report.events_considered, 2);
        assert_eq!(report.trajectory.len(), 3);
        assert!((report.trajectory[0].confidence - 1.0).abs() < 1e-9);
        assert_eq!(report.metrics.status, TrajectoryStatus::Degrading);

        let human = cmd.format_output(&output, &TrajectoryOptions::default());
        assert!(human.starts_with("asm_1: Degrading over the last 30 day(s)"));
        assert!(human.contains("Current State"));
    }

    #[test]
    fn test_trajectory_short_window_sees_settled_belief() {
        let now = Utc::now();
        let mut config = Config::default();
        config.temporal.default_lookback_days = 30;
        let cmd = TrajectoryCommand::new(hit_store(now - Duration::days(60)), config);

        let output = cmd.run_at("asm_1", now, &TrajectoryOptions::default());

        let report = output.report.unwrap();
        assert_eq!(report.events_considered, 0);
        assert_eq!(report.metrics.status, TrajectoryStatus::StableNew);
    }

    #[test]
    fn test_trajectory_unknown_belief() {
        let cmd = TrajectoryCommand::new(BeliefStore::in_memory(), Config::default());
        let output = cmd.run("asm_9", &TrajectoryOptions::default());
        assert!(!output.success);
        assert!(output.error.unwrap().contains("belief not found: asm_9"));
    }

    #[test]
    fn test_trajectory_rejects_zero_lookback() {
        let now = Utc::now();
        let cmd = TrajectoryCommand::new(hit_store(now), Config::default());
        let options = TrajectoryOptions {
            lookback_days: Some(0),
            ..Default::default()
        };
        assert!(!cmd.run_at("asm_1", now, &options).success);
    }

    #[test]
    fn test_trajectory_json_is_flat() {
        let now = Utc::now();
        let cmd = TrajectoryCommand::new(hit_store(now), Config::default());
        let options = TrajectoryOptions {
            json: true,
            lookback_days: Some(7),
            ..Default::default()
        };
        let output = cmd.run_at("asm_1", now, &options);
        let parsed: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &options)).unwrap();
        assert_eq!(parsed["lookback_days"], 7);
        assert_eq!(parsed["metrics"]["status"], "Degrading");
        assert_eq!(parsed["trajectory"].as_array().unwrap().len(), 3);
    }
}
