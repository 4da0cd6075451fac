//! The record of one pipeline execution.
//!
//! A RunRecord is built once at the end of a run and never changes
//! afterwards. Exactly one of the success payload or the error details is
//! present; the `RunOutcome` enum makes the other state unrepresentable.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::ser::{Serialize, Serializer};

use super::metrics::MetricsSnapshot;

/// Outcome of one pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Topic the pipeline was asked to write about
    pub topic: String,

    /// Target length of the article
    pub word_count: u32,

    /// Wall-clock time just before the driver was called
    pub start_time: DateTime<Local>,

    /// Wall-clock time just after the driver returned (never before `start_time`)
    pub end_time: DateTime<Local>,

    pub outcome: RunOutcome,
}

/// Success payload or failure details
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success {
        /// Final text from the last pipeline stage
        final_output: String,
        /// Content files written for this run, in write order
        output_files: Vec<PathBuf>,
        agents_used: usize,
        tasks_completed: usize,
        /// Aggregate metrics right after this run was accounted for
        metrics: MetricsSnapshot,
    },
    Failure(ErrorDetails),
}

/// Captured failure of the pipeline driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    /// One-line message including the cause chain
    pub message: String,
    /// Multi-line rendering with causes (and a backtrace when captured)
    pub trace: String,
}

impl ErrorDetails {
    /// Capture an error, keeping both the short message and the full chain
    pub fn from_error(error: &anyhow::Error) -> Self {
        Self {
            message: format!("{:#}", error),
            trace: format!("{:?}", error),
        }
    }
}

impl RunRecord {
    /// Build a successful record
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        topic: impl Into<String>,
        word_count: u32,
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
        final_output: String,
        output_files: Vec<PathBuf>,
        agents_used: usize,
        tasks_completed: usize,
        metrics: MetricsSnapshot,
    ) -> Self {
        Self {
            topic: topic.into(),
            word_count,
            start_time,
            end_time: end_time.max(start_time),
            outcome: RunOutcome::Success {
                final_output,
                output_files,
                agents_used,
                tasks_completed,
                metrics,
            },
        }
    }

    /// Build a failed record
    pub fn failure(
        topic: impl Into<String>,
        word_count: u32,
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
        error: ErrorDetails,
    ) -> Self {
        Self {
            topic: topic.into(),
            word_count,
            start_time,
            end_time: end_time.max(start_time),
            outcome: RunOutcome::Failure(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success { .. })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Duration in fractional seconds, microsecond precision
    pub fn duration_seconds(&self) -> f64 {
        duration_seconds(self.duration())
    }

    /// Final output text (successful runs only)
    pub fn final_output(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Success { final_output, .. } => Some(final_output),
            RunOutcome::Failure(_) => None,
        }
    }

    /// Files written for this run (empty for failed runs)
    pub fn output_files(&self) -> &[PathBuf] {
        match &self.outcome {
            RunOutcome::Success { output_files, .. } => output_files,
            RunOutcome::Failure(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&ErrorDetails> {
        match &self.outcome {
            RunOutcome::Success { .. } => None,
            RunOutcome::Failure(details) => Some(details),
        }
    }
}

/// Fractional seconds of a chrono duration
pub fn duration_seconds(duration: chrono::Duration) -> f64 {
    match duration.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => duration.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Render a duration as `H:MM:SS` with a `.ffffff` suffix when sub-second
/// precision is present, e.g. `0:01:05.250000`.
pub fn format_duration(duration: chrono::Duration) -> String {
    let micros = duration.num_microseconds().unwrap_or(i64::MAX).max(0);
    let total_secs = micros / 1_000_000;
    let frac = micros % 1_000_000;

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if frac == 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}:{:02}.{:06}", hours, minutes, seconds, frac)
    }
}

#[derive(serde::Serialize)]
struct SuccessDocument<'a> {
    topic: &'a str,
    word_count: u32,
    start_time: &'a DateTime<Local>,
    end_time: &'a DateTime<Local>,
    duration: String,
    duration_seconds: f64,
    final_output: &'a str,
    agents_used: usize,
    tasks_completed: usize,
    success: bool,
    output_files: Vec<&'a Path>,
    metrics: &'a MetricsSnapshot,
}

#[derive(serde::Serialize)]
struct FailureDocument<'a> {
    topic: &'a str,
    word_count: u32,
    start_time: &'a DateTime<Local>,
    end_time: &'a DateTime<Local>,
    duration: String,
    error: &'a str,
    traceback: &'a str,
    success: bool,
}

// The two record shapes are flat JSON objects with different field sets, so
// the record serializes through a per-outcome document.
impl Serialize for RunRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let duration = format_duration(self.duration());
        match &self.outcome {
            RunOutcome::Success {
                final_output,
                output_files,
                agents_used,
                tasks_completed,
                metrics,
            } => SuccessDocument {
                topic: &self.topic,
                word_count: self.word_count,
                start_time: &self.start_time,
                end_time: &self.end_time,
                duration,
                duration_seconds: self.duration_seconds(),
                final_output,
                agents_used: *agents_used,
                tasks_completed: *tasks_completed,
                success: true,
                output_files: output_files.iter().map(PathBuf::as_path).collect(),
                metrics,
            }
            .serialize(serializer),
            RunOutcome::Failure(details) => FailureDocument {
                topic: &self.topic,
                word_count: self.word_count,
                start_time: &self.start_time,
                end_time: &self.end_time,
                duration,
                error: &details.message,
                traceback: &details.trace,
                success: false,
            }
            .serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32, micros: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 6, 10, 0, secs)
            .earliest()
            .unwrap()
            + chrono::Duration::microseconds(micros as i64)
    }

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            total_runs: 1,
            successful_runs: 1,
            failed_runs: 0,
            success_rate: 100.0,
            avg_duration_seconds: 12.5,
            estimated_cost_per_run: 0.03,
            last_updated: at(30, 0),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(0)), "0:00:00");
        assert_eq!(format_duration(chrono::Duration::seconds(65)), "0:01:05");
        assert_eq!(
            format_duration(chrono::Duration::milliseconds(3_723_250)),
            "1:02:03.250000"
        );
    }

    #[test]
    fn test_success_document_shape() {
        let record = RunRecord::success(
            "Rust",
            1500,
            at(0, 0),
            at(12, 500_000),
            "final text".to_string(),
            vec![PathBuf::from("outputs/blog_posts/rust_20240506_100000.md")],
            4,
            4,
            snapshot(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["topic"], "Rust");
        assert_eq!(json["word_count"], 1500);
        assert_eq!(json["success"], true);
        assert_eq!(json["duration"], "0:00:12.500000");
        assert_eq!(json["duration_seconds"], 12.5);
        assert_eq!(json["final_output"], "final text");
        assert_eq!(json["agents_used"], 4);
        assert_eq!(json["tasks_completed"], 4);
        assert_eq!(
            json["output_files"][0],
            "outputs/blog_posts/rust_20240506_100000.md"
        );
        assert_eq!(json["metrics"]["average_duration_seconds"], 12.5);
        assert!(json.get("error").is_none());
        assert!(json["start_time"].as_str().unwrap().starts_with("2024-05-06T10:00:00"));
    }

    #[test]
    fn test_failure_document_shape() {
        let error = anyhow::anyhow!("connection reset").context("research stage failed");
        let record = RunRecord::failure("Rust", 2000, at(0, 0), at(3, 0), ErrorDetails::from_error(&error));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "research stage failed: connection reset");
        assert!(json["traceback"].as_str().unwrap().contains("connection reset"));
        assert_eq!(json["duration"], "0:00:03");
        assert!(json.get("final_output").is_none());
        assert!(json.get("output_files").is_none());
        assert!(json.get("duration_seconds").is_none());
    }

    #[test]
    fn test_end_never_precedes_start() {
        let record = RunRecord::failure(
            "t",
            10,
            at(5, 0),
            at(1, 0),
            ErrorDetails {
                message: "m".into(),
                trace: "t".into(),
            },
        );
        assert_eq!(record.end_time, record.start_time);
        assert_eq!(record.duration_seconds(), 0.0);
    }

    #[test]
    fn test_accessors_follow_outcome() {
        let ok = RunRecord::success("a", 1, at(0, 0), at(1, 0), "out".into(), vec![], 4, 4, snapshot());
        assert!(ok.is_success());
        assert_eq!(ok.final_output(), Some("out"));
        assert!(ok.error().is_none());

        let err = RunRecord::failure(
            "a",
            1,
            at(0, 0),
            at(1, 0),
            ErrorDetails {
                message: "boom".into(),
                trace: "boom".into(),
            },
        );
        assert!(!err.is_success());
        assert!(err.final_output().is_none());
        assert!(err.output_files().is_empty());
        assert_eq!(err.error().map(|e| e.message.as_str()), Some("boom"));
    }
}
