//! Read-only analytics over belief history.

pub mod temporal;

pub use temporal::{
    calculate_metrics, TemporalAnalyzer, TrajectoryMetrics, TrajectoryPoint, TrajectoryReport,
    TrajectoryStatus, MOMENTUM_THRESHOLD, VOLATILITY_THRESHOLD,
};
