//! Aggregate run metrics as seen from outside the accumulator.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Point-in-time, read-only view of the process-wide run counters.
///
/// `total_runs` counts runs that have started, so while a run is in flight
/// it exceeds `successful_runs + failed_runs` by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,

    /// Percentage of started runs that succeeded (0 when nothing has run)
    pub success_rate: f64,

    /// Mean duration over successful runs only
    #[serde(rename = "average_duration_seconds")]
    pub avg_duration_seconds: f64,

    /// Rough per-run spend derived from the cost model, not from real usage
    pub estimated_cost_per_run: f64,

    /// When this snapshot was taken
    pub last_updated: DateTime<Local>,
}

impl MetricsSnapshot {
    /// Runs that have started but not yet reported an outcome
    pub fn in_flight(&self) -> u64 {
        self.total_runs
            .saturating_sub(self.successful_runs + self.failed_runs)
    }
}
