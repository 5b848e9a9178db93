//! Belief trajectory reconstruction.
//!
//! The store keeps only a belief's current confidence plus the append-only
//! log of contradiction deltas. This module replays that log backwards from
//! the current value to rebuild the confidence path inside a lookback window,
//! then derives volatility, momentum and a status label.
//!
//! Replay algorithm:
//! 1. Keep events with `now - lookback <= timestamp <= now`, newest first
//! 2. Start at `(now, current_confidence)`
//! 3. For each event, the confidence before it was `min(1, running + delta)`
//! 4. Reverse into chronological order
//!
//! Continuous decay between events is not replayed. The reconstructed points
//! are therefore an approximation; changing that would relabel every
//! historical status, so it stays as is.
//!
//! The analyzer is read-only: it never touches the belief store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::InsightContradiction;
use crate::util::truncate_chars;

/// Volatility above which a belief is labeled unstable.
pub const VOLATILITY_THRESHOLD: f64 = 0.15;

/// Absolute daily momentum above which a belief is degrading or recovering.
pub const MOMENTUM_THRESHOLD: f64 = 0.05;

const DESCRIPTION_RATIONALE_CHARS: usize = 30;

/// Snapshot of a belief's confidence at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryPoint {
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub event_description: String,
}

/// Status label derived from trajectory metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrajectoryStatus {
    /// Fewer than two trajectory points: nothing to compare.
    #[serde(rename = "Stable (New)")]
    StableNew,
    #[serde(rename = "Stable")]
    Stable,
    #[serde(rename = "Degrading")]
    Degrading,
    #[serde(rename = "Recovering")]
    Recovering,
    #[serde(rename = "Volatile/Unstable")]
    Volatile,
}

impl TrajectoryStatus {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::StableNew => "Stable (New)",
            Self::Stable => "Stable",
            Self::Degrading => "Degrading",
            Self::Recovering => "Recovering",
            Self::Volatile => "Volatile/Unstable",
        }
    }

    /// Whether the belief is currently taking damage.
    pub fn is_collapsing(&self) -> bool {
        matches!(self, Self::Degrading | Self::Volatile)
    }
}

impl std::fmt::Display for TrajectoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derived temporal signals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryMetrics {
    /// Sample standard deviation of consecutive confidence changes.
    pub volatility_score: f64,
    /// Net confidence change per day across the trajectory.
    pub momentum_score: f64,
    pub status: TrajectoryStatus,
}

impl TrajectoryMetrics {
    pub fn status_label(&self) -> &'static str {
        self.status.label()
    }
}

/// Result of analyzing one belief.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryReport {
    /// Reconstructed points in chronological order. Points sharing a
    /// timestamp stay in replay order, so "Current State" precedes an
    /// event stamped exactly at `now`.
    pub trajectory: Vec<TrajectoryPoint>,
    pub metrics: TrajectoryMetrics,
    pub lookback_days: u32,
    /// Contradictions that fell inside the window.
    pub events_considered: usize,
    /// Whole days since the belief was created.
    pub belief_age_days: i64,
}

/// Stateless, read-only trajectory analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalAnalyzer;

impl TemporalAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Reconstruct a belief's trajectory over the last `lookback_days`.
    ///
    /// `contradictions` may contain events for other beliefs' ids only if the
    /// caller wants them replayed; the store passes a pre-filtered log.
    pub fn analyze<'a, I>(
        &self,
        current_confidence: f64,
        created_at: DateTime<Utc>,
        contradictions: I,
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> TrajectoryReport
    where
        I: IntoIterator<Item = &'a InsightContradiction>,
    {
        let cutoff = now - Duration::days(i64::from(lookback_days));

        let mut events: Vec<&InsightContradiction> = contradictions
            .into_iter()
            .filter(|c| c.timestamp >= cutoff && c.timestamp <= now)
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut trajectory = Vec::with_capacity(events.len() + 1);
        trajectory.push(TrajectoryPoint {
            timestamp: now,
            confidence: current_confidence,
            event_description: "Current State".to_string(),
        });

        let mut running = current_confidence;
        for event in &events {
            let before = (running + event.confidence_delta).min(1.0);
            trajectory.push(TrajectoryPoint {
                timestamp: event.timestamp,
                confidence: before,
                event_description: format!(
                    "Before contradiction: {}",
                    truncate_chars(&event.rationale, DESCRIPTION_RATIONALE_CHARS)
                ),
            });
            running = before;
        }

        // Stable: points sharing a timestamp keep the order they were pushed
        trajectory.sort_by_key(|p| p.timestamp);

        let metrics = calculate_metrics(&trajectory, current_confidence);

        TrajectoryReport {
            trajectory,
            metrics,
            lookback_days,
            events_considered: events.len(),
            belief_age_days: (now - created_at).num_days().max(0),
        }
    }
}

/// Compute volatility, momentum and status for a chronological trajectory.
pub fn calculate_metrics(trajectory: &[TrajectoryPoint], current_confidence: f64) -> TrajectoryMetrics {
    if trajectory.len() < 2 {
        return TrajectoryMetrics {
            volatility_score: 0.0,
            momentum_score: 0.0,
            status: TrajectoryStatus::StableNew,
        };
    }

    let deltas: Vec<f64> = trajectory
        .windows(2)
        .map(|pair| pair[1].confidence - pair[0].confidence)
        .collect();

    let volatility = match deltas.as_slice() {
        [] => 0.0,
        [only] => only.abs(),
        many => sample_std_dev(many),
    };

    let first = &trajectory[0];
    let last = &trajectory[trajectory.len() - 1];
    let elapsed_days = (last.timestamp - first.timestamp).num_days().max(1);
    let momentum = (current_confidence - first.confidence) / elapsed_days as f64;

    let status = if volatility > VOLATILITY_THRESHOLD {
        TrajectoryStatus::Volatile
    } else if momentum < -MOMENTUM_THRESHOLD {
        TrajectoryStatus::Degrading
    } else if momentum > MOMENTUM_THRESHOLD {
        TrajectoryStatus::Recovering
    } else {
        TrajectoryStatus::Stable
    };

    TrajectoryMetrics {
        volatility_score: volatility,
        momentum_score: momentum,
        status,
    }
}

fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(delta: f64, at: DateTime<Utc>) -> InsightContradiction {
        InsightContradiction::new("asm_1", "cmt", "Audience pushback on staged posts", delta).at(at)
    }

    #[test]
    fn test_no_events_is_stable_new() {
        let now = Utc::now();
        let report = TemporalAnalyzer::new().analyze(0.9, now - Duration::days(5), &[], 30, now);

        assert_eq!(report.trajectory.len(), 1);
        assert_eq!(report.trajectory[0].event_description, "Current State");
        assert_eq!(report.metrics.status, TrajectoryStatus::StableNew);
        assert_eq!(report.metrics.volatility_score, 0.0);
        assert_eq!(report.metrics.momentum_score, 0.0);
        assert_eq!(report.belief_age_days, 5);
    }

    #[test]
    fn test_single_replay_is_inverse_of_subtraction() {
        let now = Utc::now();
        let events = vec![hit(0.2, now - Duration::days(2))];
        let report = TemporalAnalyzer::new().analyze(0.6, now, &events, 30, now);

        assert_eq!(report.trajectory.len(), 2);
        assert!((report.trajectory[0].confidence - 0.8).abs() < 1e-9);
        assert!((report.trajectory[1].confidence - 0.6).abs() < 1e-9);
        // Exactly one delta: volatility is its magnitude
        assert!((report.metrics.volatility_score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_replay_clamps_at_one() {
        let now = Utc::now();
        let events = vec![hit(0.5, now - Duration::days(1))];
        let report = TemporalAnalyzer::new().analyze(0.9, now, &events, 30, now);
        assert_eq!(report.trajectory[0].confidence, 1.0);
    }

    #[test]
    fn test_old_settled_damage_is_stable() {
        let now = Utc::now();
        let events = vec![
            hit(0.2, now - Duration::days(20)),
            hit(0.2, now - Duration::days(19)),
        ];
        let report = TemporalAnalyzer::new().analyze(0.6, now - Duration::days(60), &events, 30, now);

        assert_eq!(report.events_considered, 2);
        assert_eq!(report.trajectory.len(), 3);
        assert!((report.trajectory[0].confidence - 1.0).abs() < 1e-9);
        assert!(report.metrics.volatility_score < 1e-9);
        assert!((report.metrics.momentum_score - (-0.02)).abs() < 1e-9);
        assert_eq!(report.metrics.status_label(), "Stable");
    }

    #[test]
    fn test_fresh_concentrated_damage_is_degrading() {
        let now = Utc::now();
        let events = vec![
            hit(0.1, now - Duration::days(3)),
            hit(0.1, now - Duration::days(2)),
            hit(0.2, now - Duration::days(1)),
        ];
        let report = TemporalAnalyzer::new().analyze(0.6, now - Duration::days(60), &events, 10, now);

        assert!(report.metrics.status.is_collapsing());
        assert!(["Degrading", "Volatile/Unstable"].contains(&report.metrics.status_label()));
        assert!(report.metrics.momentum_score < -MOMENTUM_THRESHOLD);
    }

    #[test]
    fn test_same_confidence_different_histories() {
        let now = Utc::now();
        let analyzer = TemporalAnalyzer::new();

        let old = vec![
            hit(0.2, now - Duration::days(20)),
            hit(0.2, now - Duration::days(19)),
        ];
        let fresh = vec![
            hit(0.1, now - Duration::hours(70)),
            hit(0.1, now - Duration::hours(40)),
            hit(0.2, now - Duration::hours(10)),
        ];

        let old_report = analyzer.analyze(0.6, now - Duration::days(90), &old, 30, now);
        let fresh_report = analyzer.analyze(0.6, now - Duration::days(90), &fresh, 10, now);

        assert_eq!(old_report.metrics.status, TrajectoryStatus::Stable);
        assert!(fresh_report.metrics.status.is_collapsing());
    }

    #[test]
    fn test_lookback_excludes_old_events() {
        let now = Utc::now();
        let events = vec![
            hit(0.2, now - Duration::days(40)),
            hit(0.1, now - Duration::days(5)),
        ];
        let report = TemporalAnalyzer::new().analyze(0.7, now, &events, 30, now);
        assert_eq!(report.events_considered, 1);
        assert!((report.trajectory[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_future_events_are_ignored() {
        let now = Utc::now();
        let events = vec![hit(0.3, now + Duration::days(1))];
        let report = TemporalAnalyzer::new().analyze(0.7, now, &events, 30, now);
        assert_eq!(report.events_considered, 0);
        assert_eq!(report.metrics.status, TrajectoryStatus::StableNew);
    }

    #[test]
    fn test_large_single_hit_is_volatile() {
        let now = Utc::now();
        let events = vec![hit(0.3, now - Duration::days(10))];
        let report = TemporalAnalyzer::new().analyze(0.7, now, &events, 30, now);
        assert_eq!(report.metrics.status, TrajectoryStatus::Volatile);
    }

    #[test]
    fn test_trajectory_is_chronological() {
        let now = Utc::now();
        let events = vec![
            hit(0.05, now - Duration::days(1)),
            hit(0.05, now - Duration::days(9)),
            hit(0.05, now - Duration::days(4)),
        ];
        let report = TemporalAnalyzer::new().analyze(0.8, now, &events, 30, now);
        let times: Vec<_> = report.trajectory.iter().map(|p| p.timestamp).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(report.trajectory.last().unwrap().event_description, "Current State");
    }

    #[test]
    fn test_tied_timestamps_keep_replay_order() {
        let now = Utc::now();
        let at = now - Duration::days(2);
        let events = vec![hit(0.1, at), hit(0.3, at)];
        let report = TemporalAnalyzer::new().analyze(0.5, now, &events, 30, now);

        let confidences: Vec<f64> = report.trajectory.iter().map(|p| p.confidence).collect();
        assert_eq!(confidences.len(), 3);
        assert!((confidences[0] - 0.6).abs() < 1e-9);
        assert!((confidences[1] - 0.9).abs() < 1e-9);
        assert!((confidences[2] - 0.5).abs() < 1e-9);

        // Deltas +0.3 and -0.4
        assert!((report.metrics.volatility_score - 0.245f64.sqrt()).abs() < 1e-9);
        assert!((report.metrics.momentum_score - (-0.05)).abs() < 1e-9);
        assert_eq!(report.metrics.status, TrajectoryStatus::Volatile);
    }

    #[test]
    fn test_event_at_now_follows_current_state() {
        let now = Utc::now();
        let events = vec![hit(0.2, now)];
        let report = TemporalAnalyzer::new().analyze(0.6, now, &events, 30, now);

        assert_eq!(report.events_considered, 1);
        assert_eq!(report.trajectory[0].event_description, "Current State");
        assert!((report.trajectory[1].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_description_truncates_rationale() {
        let now = Utc::now();
        let long = InsightContradiction::new("asm_1", "cmt", "x".repeat(80), 0.1)
            .at(now - Duration::days(1));
        let report = TemporalAnalyzer::new().analyze(0.5, now, [&long], 30, now);
        let description = &report.trajectory[0].event_description;
        assert!(description.ends_with("..."));
        assert!(description.len() < 80);
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&TrajectoryStatus::Volatile).unwrap();
        assert_eq!(json, "\"Volatile/Unstable\"");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Property: replay never produces confidence outside [current, 1]
            #[test]
            fn prop_replayed_points_bounded(
                current in 0.0f64..=1.0,
                deltas in proptest::collection::vec(0.0f64..0.5, 0..12),
            ) {
                let now = Utc::now();
                let events: Vec<_> = deltas
                    .iter()
                    .enumerate()
                    .map(|(i, d)| hit(*d, now - Duration::hours(i as i64 + 1)))
                    .collect();
                let report = TemporalAnalyzer::new().analyze(current, now, &events, 30, now);

                prop_assert_eq!(report.trajectory.len(), events.len() + 1);
                for point in &report.trajectory {
                    prop_assert!(point.confidence <= 1.0);
                    prop_assert!(point.confidence >= current - 1e-12);
                }
                prop_assert!(report.metrics.volatility_score >= 0.0);
            }
        }
    }
}
