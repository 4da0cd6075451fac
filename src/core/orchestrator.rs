//! Main workflow orchestrator.
//!
//! Wraps one pipeline driver call per run with metrics accounting, content
//! artifacts and a persisted run record. `run_workflow` never fails: driver
//! errors become failure records and persistence errors are only logged.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::{OutputLayout, Settings};
use crate::domain::run::{duration_seconds, format_duration};
use crate::domain::{ArtifactSet, ErrorDetails, MetricsSnapshot, RunRecord};

use super::artifacts::ArtifactWriter;
use super::driver::{AgentInfo, PipelineDriver};
use super::metrics::MetricsAccumulator;
use super::pipeline::RESEARCH_STAGE;
use super::recorder::RunRecorder;

/// Static description of an orchestrator and its agents
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatus {
    pub agents: Vec<AgentInfo>,
    pub configuration: Settings,
    pub directories_created: bool,
    pub tools_initialized: bool,
}

/// Runs topics through a pipeline driver and records every outcome
pub struct WorkflowOrchestrator<D: PipelineDriver> {
    settings: Settings,
    layout: OutputLayout,
    driver: D,
    metrics: MetricsAccumulator,
    recorder: RunRecorder,
    writer: ArtifactWriter,
    tools_initialized: bool,
}

impl<D: PipelineDriver> WorkflowOrchestrator<D> {
    /// Create an orchestrator, creating the output directories
    pub fn new(settings: Settings, driver: D) -> Result<Self> {
        let layout = settings.layout();
        layout
            .ensure()
            .context("Failed to set up output directories")?;
        info!(output_dir = %layout.root.display(), "Directory structure created");

        let writer = ArtifactWriter::new(&layout).with_html_escape(settings.html_escape);
        let recorder = RunRecorder::new(&layout);
        let metrics = MetricsAccumulator::new(settings.cost);

        Ok(Self {
            settings,
            layout,
            driver,
            metrics,
            recorder,
            writer,
            tools_initialized: false,
        })
    }

    /// Create an orchestrator and verify the driver's external tools
    pub async fn connect(settings: Settings, driver: D) -> Result<Self> {
        let mut orchestrator = Self::new(settings, driver)?;
        orchestrator
            .driver
            .health_check()
            .await
            .context("Failed to initialize pipeline tools")?;
        orchestrator.tools_initialized = true;
        info!(agents = orchestrator.driver.agents().len(), "Orchestrator initialized");
        Ok(orchestrator)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run the pipeline once for `topic` and record the outcome
    #[instrument(skip(self))]
    pub async fn run_workflow(&self, topic: &str, word_count: u32) -> RunRecord {
        self.metrics.record_run_start();
        let start_time = Local::now();
        info!(word_count, "Starting workflow");

        let outcome = self.driver.execute(topic, word_count).await;

        let end_time = Local::now();
        let elapsed = duration_seconds(end_time - start_time);

        match outcome {
            Ok(result) => {
                self.metrics.record_run_end(true, elapsed);

                let stamp = start_time.naive_local();
                let artifacts = self.writer.write(topic, &result.final_output, stamp).await;
                if let Some(research) = result.stage(RESEARCH_STAGE) {
                    if let Err(e) = self
                        .writer
                        .write_research_report(topic, &research.content, stamp)
                        .await
                    {
                        warn!(error = %format!("{:#}", e), "Failed to save research report");
                    }
                }

                let tasks_completed = result.stages.len();
                let record = RunRecord::success(
                    topic,
                    word_count,
                    start_time,
                    end_time,
                    result.final_output,
                    artifacts.paths(),
                    self.driver.agents().len(),
                    tasks_completed,
                    self.metrics.snapshot(),
                );

                if let Err(e) = self.recorder.record_success(&record).await {
                    error!(error = %format!("{:#}", e), "Error saving workflow results");
                }

                info!(
                    duration = %format_duration(record.duration()),
                    output_chars = record.final_output().map(str::len).unwrap_or(0),
                    "Workflow completed successfully"
                );
                record
            }
            Err(e) => {
                self.metrics.record_run_end(false, elapsed);

                let details = ErrorDetails::from_error(&anyhow::Error::new(e));
                error!(error = %details.message, "Workflow failed");

                let record = RunRecord::failure(topic, word_count, start_time, end_time, details);
                if let Err(e) = self.recorder.record_failure(&record).await {
                    error!(error = %format!("{:#}", e), "Error saving error report");
                }
                record
            }
        }
    }

    /// Run several topics one after another; one failure never stops the rest
    pub async fn batch_process<S: AsRef<str>>(&self, topics: &[S], word_count: u32) -> Vec<RunRecord> {
        let total = topics.len();
        info!(total, "Starting batch processing");

        let mut results = Vec::with_capacity(total);
        for (i, topic) in topics.iter().enumerate() {
            let topic = topic.as_ref();
            info!(index = i + 1, total, %topic, "Processing topic");

            let record = self.run_workflow(topic, word_count).await;
            if record.is_success() {
                info!(%topic, "Completed");
            } else {
                error!(%topic, "Failed");
            }
            results.push(record);
        }

        let successful = results.iter().filter(|r| r.is_success()).count();
        info!(
            successful,
            failed = total - successful,
            "Batch processing completed"
        );
        results
    }

    /// Write the multi-format artifacts for arbitrary content
    pub async fn save_output_files(
        &self,
        topic: &str,
        content: &str,
        timestamp: NaiveDateTime,
    ) -> ArtifactSet {
        self.writer.write(topic, content, timestamp).await
    }

    /// Current aggregate metrics
    pub fn performance_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Static cost estimate for one run
    pub fn estimate_cost(&self) -> f64 {
        self.metrics.cost_model().estimate_per_run()
    }

    /// Agents, configuration and initialization state
    pub fn workflow_status(&self) -> WorkflowStatus {
        WorkflowStatus {
            agents: self.driver.agents(),
            configuration: self.settings.clone(),
            directories_created: self.layout.directories().iter().all(|d| d.is_dir()),
            tools_initialized: self.tools_initialized,
        }
    }
}
