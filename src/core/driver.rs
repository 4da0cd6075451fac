//! The pipeline driver boundary.
//!
//! The orchestrator only sees `PipelineDriver::execute`: one call per run,
//! returning the final text or an error. `StagedDriver` is the production
//! implementation, running each stage of a `Pipeline` through an `Adapter`
//! strictly in order and feeding each stage the previous stage's output.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::adapters::Adapter;

use super::pipeline::{Pipeline, Stage};

/// Output of one completed stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub stage: String,
    pub role: String,
    pub content: String,
    pub duration_ms: u64,
    pub attempts: u32,
}

/// Successful result of a whole pipeline execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// Text produced by the last stage
    pub final_output: String,

    /// Every stage in execution order
    pub stages: Vec<StageOutput>,
}

impl PipelineResult {
    /// A result with no per-stage breakdown
    pub fn from_output(final_output: impl Into<String>) -> Self {
        Self {
            final_output: final_output.into(),
            stages: Vec::new(),
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageOutput> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Pipeline failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage '{stage}' failed after {attempts} attempt(s)")]
    StageFailed {
        stage: String,
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Stage '{stage}' produced no output")]
    EmptyOutput { stage: String },

    #[error("Pipeline driver unavailable: {0}")]
    Unavailable(String),
}

/// Description of one agent, for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub stage: String,
    pub role: String,
    pub goal: String,
    pub tools: Vec<String>,
    /// Whether the agent sees the previous stage's output
    pub uses_context: bool,
    pub max_execution_time: u64,
}

impl From<&Stage> for AgentInfo {
    fn from(stage: &Stage) -> Self {
        Self {
            stage: stage.name.clone(),
            role: stage.role.clone(),
            goal: stage.goal.clone(),
            tools: stage.tools.clone(),
            uses_context: stage.uses_context,
            max_execution_time: stage.timeout_seconds,
        }
    }
}

/// The multi-stage content generator, opaque to the rest of the crate
#[async_trait]
pub trait PipelineDriver: Send + Sync {
    /// Run the whole pipeline once for a topic
    async fn execute(&self, topic: &str, word_count: u32) -> Result<PipelineResult, PipelineError>;

    /// Agents taking part in a run
    fn agents(&self) -> Vec<AgentInfo> {
        Vec::new()
    }

    /// Verify external dependencies before the first run
    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Runs a `Pipeline` stage by stage through an adapter
pub struct StagedDriver<A: Adapter> {
    pipeline: Pipeline,
    adapter: A,
}

impl<A: Adapter> StagedDriver<A> {
    /// Create a driver; the pipeline must validate
    pub fn new(pipeline: Pipeline, adapter: A) -> anyhow::Result<Self> {
        pipeline.validate()?;
        Ok(Self { pipeline, adapter })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        topic: &str,
        word_count: u32,
        context: Option<&str>,
    ) -> Result<StageOutput, PipelineError> {
        let prompt = stage.render_prompt(topic, word_count, context);
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self
                .adapter
                .execute(stage.pattern.as_deref(), &prompt, stage.timeout())
                .await
            {
                Ok(output) if output.content.trim().is_empty() => {
                    error!(stage = %stage.name, attempt, "Stage produced no output");
                    return Err(PipelineError::EmptyOutput {
                        stage: stage.name.clone(),
                    });
                }
                Ok(output) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    info!(
                        stage = %stage.name,
                        attempt,
                        duration_ms,
                        chars = output.content.len(),
                        "Stage completed"
                    );
                    return Ok(StageOutput {
                        stage: stage.name.clone(),
                        role: stage.role.clone(),
                        content: output.content,
                        duration_ms,
                        attempts: attempt,
                    });
                }
                Err(e) if stage.retry_policy.should_retry(attempt) => {
                    let delay = stage.retry_policy.delay_for_attempt(attempt);
                    warn!(
                        stage = %stage.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Stage failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(stage = %stage.name, attempt, error = %e, "Stage failed permanently");
                    return Err(PipelineError::StageFailed {
                        stage: stage.name.clone(),
                        attempts: attempt,
                        source: e.into(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl<A: Adapter> PipelineDriver for StagedDriver<A> {
    #[instrument(skip(self), fields(pipeline = %self.pipeline.name, adapter = self.adapter.name()))]
    async fn execute(&self, topic: &str, word_count: u32) -> Result<PipelineResult, PipelineError> {
        let mut stages: Vec<StageOutput> = Vec::with_capacity(self.pipeline.stages.len());

        for stage in &self.pipeline.stages {
            info!(stage = %stage.name, role = %stage.role, "Starting stage");
            let context = stages.last().map(|s| s.content.as_str());
            let output = self.run_stage(stage, topic, word_count, context).await?;
            stages.push(output);
        }

        let final_output = stages
            .last()
            .map(|s| s.content.clone())
            .ok_or_else(|| PipelineError::Unavailable("pipeline has no stages".to_string()))?;

        Ok(PipelineResult {
            final_output,
            stages,
        })
    }

    fn agents(&self) -> Vec<AgentInfo> {
        self.pipeline.stages.iter().map(AgentInfo::from).collect()
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.adapter.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterOutput;
    use crate::config::Settings;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with a canned answer per call and remembers every prompt
    struct EchoAdapter {
        replies: Mutex<Vec<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl EchoAdapter {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Adapter for EchoAdapter {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(
            &self,
            _pattern: Option<&str>,
            input: &str,
            _timeout: Duration,
        ) -> anyhow::Result<AdapterOutput> {
            self.prompts.lock().unwrap().push(input.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("default".to_string()))?;
            Ok(AdapterOutput::new(reply))
        }

        async fn health_check(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn fast_pipeline() -> Pipeline {
        let mut pipeline = Pipeline::content_default(&Settings::default());
        for stage in &mut pipeline.stages {
            stage.retry_policy.initial_delay_ms = 1;
            stage.retry_policy.max_delay_ms = 1;
        }
        pipeline
    }

    #[tokio::test]
    async fn test_stages_run_in_order_with_context() {
        let adapter = EchoAdapter::new(vec![
            Ok("research notes".into()),
            Ok("draft".into()),
            Ok("edited".into()),
            Ok("published".into()),
        ]);
        let driver = StagedDriver::new(fast_pipeline(), adapter).unwrap();

        let result = driver.execute("Rust", 800).await.unwrap();

        assert_eq!(result.final_output, "published");
        let names: Vec<&str> = result.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(names, ["research", "writing", "editing", "publishing"]);
        assert_eq!(result.stage("research").unwrap().content, "research notes");

        let prompts = driver.adapter.prompts.lock().unwrap();
        assert!(prompts[0].contains("Research the topic: Rust"));
        assert!(prompts[1].contains("800-word blog post on Rust"));
        assert!(prompts[1].ends_with("research notes"));
        assert!(prompts[3].ends_with("edited"));
    }

    #[tokio::test]
    async fn test_stage_retries_then_succeeds() {
        let adapter = EchoAdapter::new(vec![
            Err(anyhow::anyhow!("rate limited")),
            Ok("research".into()),
        ]);
        let driver = StagedDriver::new(fast_pipeline(), adapter).unwrap();

        let result = driver.execute("Rust", 100).await.unwrap();
        assert_eq!(result.stages[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_stage_exhausts_attempts() {
        let adapter = EchoAdapter::new(vec![
            Ok("research".into()),
            Err(anyhow::anyhow!("boom 1")),
            Err(anyhow::anyhow!("boom 2")),
            Err(anyhow::anyhow!("boom 3")),
        ]);
        let driver = StagedDriver::new(fast_pipeline(), adapter).unwrap();

        let err = driver.execute("Rust", 100).await.unwrap_err();
        match err {
            PipelineError::StageFailed { ref stage, attempts, .. } => {
                assert_eq!(stage, "writing");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        let chain = format!("{:#}", anyhow::Error::new(err));
        assert!(chain.contains("boom 3"), "{chain}");
    }

    #[tokio::test]
    async fn test_blank_output_fails_the_run() {
        let adapter = EchoAdapter::new(vec![Ok("   \n".into())]);
        let driver = StagedDriver::new(fast_pipeline(), adapter).unwrap();

        let err = driver.execute("Rust", 100).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyOutput { ref stage } if stage == "research"));
    }

    #[test]
    fn test_agents_describe_stages() {
        let driver = StagedDriver::new(fast_pipeline(), EchoAdapter::new(vec![])).unwrap();
        let agents = driver.agents();

        assert_eq!(agents.len(), 4);
        assert_eq!(agents[0].role, "Senior Research Analyst");
        assert_eq!(agents[3].tools, ["file_writer"]);
        assert_eq!(agents[1].max_execution_time, 600);
    }

    #[test]
    fn test_invalid_pipeline_rejected() {
        let mut pipeline = fast_pipeline();
        pipeline.stages.clear();
        assert!(StagedDriver::new(pipeline, EchoAdapter::new(vec![])).is_err());
    }
}
