//! Persists run records as pretty-printed JSON.
//!
//! Successful runs go to `metrics/workflow_results_{ts}.json`, failed runs to
//! `logs/error_report_{ts}.json`. The timestamp is the wall-clock time of the
//! write at second granularity, so two records written within the same
//! second share a name and the later one wins.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tokio::fs;
use tracing::info;

use crate::config::OutputLayout;
use crate::domain::RunRecord;

use super::artifacts::FILE_TIMESTAMP_FORMAT;

const RESULT_PREFIX: &str = "workflow_results";
const ERROR_PREFIX: &str = "error_report";

/// Writes one record file per finished run
#[derive(Debug, Clone)]
pub struct RunRecorder {
    /// Destination for success records
    metrics_dir: PathBuf,

    /// Destination for error reports
    logs_dir: PathBuf,
}

impl RunRecorder {
    pub fn new(layout: &OutputLayout) -> Self {
        Self {
            metrics_dir: layout.metrics.clone(),
            logs_dir: layout.logs.clone(),
        }
    }

    /// Path a success record written at `at` would use
    pub fn result_path(&self, at: DateTime<Local>) -> PathBuf {
        self.metrics_dir.join(format!(
            "{}_{}.json",
            RESULT_PREFIX,
            at.format(FILE_TIMESTAMP_FORMAT)
        ))
    }

    /// Path an error report written at `at` would use
    pub fn error_path(&self, at: DateTime<Local>) -> PathBuf {
        self.logs_dir.join(format!(
            "{}_{}.json",
            ERROR_PREFIX,
            at.format(FILE_TIMESTAMP_FORMAT)
        ))
    }

    /// Persist a successful run
    pub async fn record_success(&self, record: &RunRecord) -> Result<PathBuf> {
        if !record.is_success() {
            anyhow::bail!("Refusing to store failed run '{}' as a result", record.topic);
        }
        let path = self.result_path(Local::now());
        write_record(&path, record).await?;
        info!(path = %path.display(), "Workflow results saved");
        Ok(path)
    }

    /// Persist a failed run
    pub async fn record_failure(&self, record: &RunRecord) -> Result<PathBuf> {
        if record.is_success() {
            anyhow::bail!(
                "Refusing to store successful run '{}' as an error report",
                record.topic
            );
        }
        let path = self.error_path(Local::now());
        write_record(&path, record).await?;
        info!(path = %path.display(), "Error report saved");
        Ok(path)
    }

    /// Persist a record to the location matching its outcome
    pub async fn record(&self, record: &RunRecord) -> Result<PathBuf> {
        if record.is_success() {
            self.record_success(record).await
        } else {
            self.record_failure(record).await
        }
    }
}

async fn write_record(path: &Path, record: &RunRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialize run record")?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write run record: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::MetricsAccumulator;
    use crate::domain::ErrorDetails;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn recorder_in(temp: &TempDir) -> RunRecorder {
        let layout = OutputLayout::new(temp.path());
        layout.ensure().unwrap();
        RunRecorder::new(&layout)
    }

    fn success_record() -> RunRecord {
        let start = Local::now();
        RunRecord::success(
            "Rust",
            2000,
            start,
            start + chrono::Duration::seconds(4),
            "article".to_string(),
            vec![PathBuf::from("a.md")],
            4,
            4,
            MetricsAccumulator::default().snapshot(),
        )
    }

    fn failure_record() -> RunRecord {
        let start = Local::now();
        RunRecord::failure(
            "Rust",
            2000,
            start,
            start,
            ErrorDetails {
                message: "driver exploded".to_string(),
                trace: "driver exploded\n\nCaused by:\n    boom".to_string(),
            },
        )
    }

    #[test]
    fn test_paths_use_second_granularity() {
        let temp = TempDir::new().unwrap();
        let recorder = recorder_in(&temp);
        let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).earliest().unwrap();

        assert!(recorder
            .result_path(at)
            .ends_with("metrics/workflow_results_20240102_030405.json"));
        assert!(recorder
            .error_path(at)
            .ends_with("logs/error_report_20240102_030405.json"));
    }

    #[tokio::test]
    async fn test_record_success_writes_json() {
        let temp = TempDir::new().unwrap();
        let recorder = recorder_in(&temp);

        let path = recorder.record_success(&success_record()).await.unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert!(path.starts_with(temp.path().join("metrics")));
        assert_eq!(json["success"], true);
        assert_eq!(json["final_output"], "article");
        assert_eq!(json["duration_seconds"], 4.0);
    }

    #[tokio::test]
    async fn test_record_failure_writes_error_report() {
        let temp = TempDir::new().unwrap();
        let recorder = recorder_in(&temp);

        let path = recorder.record(&failure_record()).await.unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert!(path.starts_with(temp.path().join("logs")));
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "driver exploded");
        assert!(json["traceback"].as_str().unwrap().contains("Caused by"));
    }

    #[tokio::test]
    async fn test_mismatched_outcome_is_rejected() {
        let temp = TempDir::new().unwrap();
        let recorder = recorder_in(&temp);

        assert!(recorder.record_success(&failure_record()).await.is_err());
        assert!(recorder.record_failure(&success_record()).await.is_err());
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let recorder = RunRecorder::new(&OutputLayout::new(temp.path().join("missing")));

        assert!(recorder.record(&success_record()).await.is_err());
    }
}
