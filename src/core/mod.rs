//! Core orchestration logic.
//!
//! This module contains:
//! - Metrics: Process-wide run counters
//! - Artifacts: Multi-format article writer
//! - Recorder: Per-run result and error records
//! - Pipeline: Stage personas, prompts and limits
//! - Driver: The pipeline execution boundary
//! - Orchestrator: Ties the above together per run

pub mod artifacts;
pub mod driver;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod recorder;

// Re-export commonly used types
pub use artifacts::{file_stem, slugify, ArtifactWriter};
pub use driver::{AgentInfo, PipelineDriver, PipelineError, PipelineResult, StageOutput, StagedDriver};
pub use metrics::{CostModel, MetricsAccumulator};
pub use orchestrator::{WorkflowOrchestrator, WorkflowStatus};
pub use pipeline::{Pipeline, RetryPolicy, Stage};
pub use recorder::RunRecorder;
