//! Process-wide run counters.
//!
//! Counters are monotonic for the lifetime of the accumulator. The mean
//! duration is maintained incrementally over successful runs only:
//!
//! ```text
//! avg' = (avg * n + d) / (n + 1)      n = successful runs before this one
//! ```

use std::sync::{Mutex, MutexGuard};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::MetricsSnapshot;

/// Static per-run cost estimate (tokens x price), independent of real usage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Average tokens consumed by one run
    pub estimated_tokens: u64,

    /// Price in USD per thousand tokens
    pub cost_per_1k_tokens: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            estimated_tokens: 15_000,
            cost_per_1k_tokens: 0.002,
        }
    }
}

impl CostModel {
    pub fn estimate_per_run(&self) -> f64 {
        (self.estimated_tokens as f64 / 1000.0) * self.cost_per_1k_tokens
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_runs: u64,
    successful_runs: u64,
    failed_runs: u64,
    avg_duration_seconds: f64,
}

/// Thread-safe accumulator for run outcomes.
///
/// Each operation holds the lock for its whole read-modify-write, so a
/// shared accumulator never loses an increment.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    counters: Mutex<Counters>,
    cost: CostModel,
}

impl MetricsAccumulator {
    pub fn new(cost: CostModel) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            cost,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Counters stay consistent even if a holder panicked mid-update
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count a run as started, before its outcome is known
    pub fn record_run_start(&self) {
        let mut counters = self.lock();
        counters.total_runs += 1;
        debug!(total_runs = counters.total_runs, "Run started");
    }

    /// Account for a finished run.
    ///
    /// Failed runs bump `failed_runs` only; their duration never enters the
    /// average.
    pub fn record_run_end(&self, success: bool, duration_seconds: f64) {
        let mut counters = self.lock();

        if success {
            let duration = if duration_seconds.is_finite() {
                duration_seconds.max(0.0)
            } else {
                0.0
            };
            let previous = counters.successful_runs as f64;
            counters.successful_runs += 1;
            counters.avg_duration_seconds = (counters.avg_duration_seconds * previous + duration)
                / counters.successful_runs as f64;
        } else {
            counters.failed_runs += 1;
        }

        debug!(
            success,
            duration_seconds,
            successful_runs = counters.successful_runs,
            failed_runs = counters.failed_runs,
            "Run accounted"
        );
    }

    /// Read the current aggregate without changing it
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = *self.lock();

        let success_rate = if counters.total_runs > 0 {
            counters.successful_runs as f64 / counters.total_runs as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            total_runs: counters.total_runs,
            successful_runs: counters.successful_runs,
            failed_runs: counters.failed_runs,
            success_rate,
            avg_duration_seconds: counters.avg_duration_seconds,
            estimated_cost_per_run: self.cost.estimate_per_run(),
            last_updated: Local::now(),
        }
    }

    pub fn cost_model(&self) -> CostModel {
        self.cost
    }
}
