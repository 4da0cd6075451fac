//! quillcrew - four-stage content pipeline with run bookkeeping
//!
//! Drives a research -> writing -> editing -> publishing pipeline of LLM
//! agents and records what every run produced.
//!
//! # Architecture
//!
//! The content generation itself sits behind the `PipelineDriver` trait.
//! Around each driver call the orchestrator:
//! - counts the run in a process-wide metrics accumulator
//! - writes the article as markdown, text, HTML and JSON metadata
//! - persists a JSON result record (or an error report on failure)
//!
//! # Modules
//!
//! - `adapters`: External LLM backends (Fabric)
//! - `core`: Orchestration logic (Metrics, Artifacts, Recorder, Pipeline, Driver)
//! - `domain`: Data structures (RunRecord, ArtifactSet, MetricsSnapshot)
//! - `config`: Layered configuration and output layout
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Write one article
//! quillcrew run "Machine Learning in Healthcare" --word-count 1500
//!
//! # Several topics, one after another
//! quillcrew batch "AI Ethics" "Space Exploration"
//!
//! # Prompt for topics until 'quit'
//! quillcrew interactive
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use config::{OutputLayout, Settings};
pub use core::{
    slugify, ArtifactWriter, MetricsAccumulator, PipelineDriver, PipelineError, PipelineResult,
    RunRecorder, WorkflowOrchestrator,
};
pub use domain::{ArtifactFormat, ArtifactSet, MetricsSnapshot, RunOutcome, RunRecord};
