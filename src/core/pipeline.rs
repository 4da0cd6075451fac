//! Pipeline definitions: the agent personas and task templates for each
//! stage, plus per-stage timeouts and retry policy.
//!
//! The stock pipeline is research -> writing -> editing -> publishing. A
//! pipeline can also be loaded from YAML with the same shape.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Placeholder replaced by the run's topic
pub const TOPIC_PLACEHOLDER: &str = "{topic}";

/// Placeholder replaced by the run's target word count
pub const WORD_COUNT_PLACEHOLDER: &str = "{word_count}";

/// Name of the stock research stage; its output is saved as a research report
pub const RESEARCH_STAGE: &str = "research";

/// An ordered set of stages executed one after another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,

    pub description: String,

    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Pipeline name cannot be empty");
        }

        if self.stages.is_empty() {
            anyhow::bail!("Pipeline must have at least one stage");
        }

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.is_empty() {
                anyhow::bail!("Stage {} has an empty name", i);
            }
            if self.stages[..i].iter().any(|s| s.name == stage.name) {
                anyhow::bail!("Duplicate stage name '{}'", stage.name);
            }
            if stage.task.trim().is_empty() {
                anyhow::bail!("Stage '{}' has an empty task", stage.name);
            }
            if stage.timeout_seconds == 0 {
                anyhow::bail!("Stage '{}' must have a positive timeout", stage.name);
            }
            if stage.retry_policy.max_attempts == 0 {
                anyhow::bail!("Stage '{}' must allow at least one attempt", stage.name);
            }
        }

        if self.stages[0].uses_context {
            anyhow::bail!(
                "First stage '{}' cannot take context from a previous stage",
                self.stages[0].name
            );
        }

        Ok(())
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The stock four-stage content pipeline
    pub fn content_default(settings: &Settings) -> Self {
        let timeouts = settings.timeouts;
        Self {
            name: "content".to_string(),
            description: "Research, write, edit and publish an article".to_string(),
            stages: vec![
                Stage {
                    name: RESEARCH_STAGE.to_string(),
                    role: "Senior Research Analyst".to_string(),
                    goal: "Research the assigned topic thoroughly and report accurate, well-sourced findings".to_string(),
                    backstory: "A meticulous analyst across technology, science and current affairs who verifies facts against several credible sources and presents findings in a structured, actionable form.".to_string(),
                    tools: vec!["web_search".to_string()],
                    task: "Research the topic: {topic}\n\n\
                           Cover the current state of the topic, key concepts, recent developments, \
                           practical applications, future implications, expert opinion and supporting statistics.\n\n\
                           Deliver an executive summary, key findings by subtopic, sources and references, \
                           candidate angles for the article and the most important data points. \
                           Aim for 1000-1500 words of research notes."
                        .to_string(),
                    expected_output: "Research report on {topic} with key findings, sources and content angles".to_string(),
                    pattern: None,
                    timeout_seconds: timeouts.research,
                    retry_policy: RetryPolicy::with_attempts(3),
                    uses_context: false,
                },
                Stage {
                    name: "writing".to_string(),
                    role: "Expert Technical Writer".to_string(),
                    goal: "Turn research findings into an engaging, well-structured and informative article".to_string(),
                    backstory: "A technical writer who makes complex topics accessible, keeps structure and flow tight, and adapts tone to the audience without losing accuracy.".to_string(),
                    tools: Vec::new(),
                    task: "Using the research provided, write a {word_count}-word blog post on {topic}.\n\n\
                           Open with a hook, explain the fundamentals, cover recent developments, give real-world \
                           examples, discuss future implications and close with a conclusion. Cite sources.\n\n\
                           Use markdown headers, active voice and a consistent, accessible tone. \
                           Target exactly {word_count} words."
                        .to_string(),
                    expected_output: "Complete {word_count}-word blog post with clear structure".to_string(),
                    pattern: None,
                    timeout_seconds: timeouts.writing,
                    retry_policy: RetryPolicy::with_attempts(3),
                    uses_context: true,
                },
                Stage {
                    name: "editing".to_string(),
                    role: "Senior Content Editor".to_string(),
                    goal: "Review and improve the draft for correctness, clarity and readability".to_string(),
                    backstory: "An editor with an eye for detail who fixes errors, tightens flow, checks facts and keeps style consistent to a professional publishing standard.".to_string(),
                    tools: Vec::new(),
                    task: "Edit the blog post on {topic} for grammar, spelling, clarity, flow, technical accuracy, \
                           consistency of tone and formatting. Verify facts where possible.\n\n\
                           Return the edited article, a summary of changes, suggestions and a quality score. \
                           Keep the article at {word_count} words."
                        .to_string(),
                    expected_output: "Polished article with an editing summary".to_string(),
                    pattern: None,
                    timeout_seconds: timeouts.editing,
                    retry_policy: RetryPolicy::with_attempts(2),
                    uses_context: true,
                },
                Stage {
                    name: "publishing".to_string(),
                    role: "Content Publishing Specialist".to_string(),
                    goal: "Format and finalize the article with metadata so it is ready for distribution".to_string(),
                    backstory: "A publishing specialist who adds metadata, structure and SEO elements and knows how each distribution format should look.".to_string(),
                    tools: vec!["file_writer".to_string()],
                    task: "Prepare the final article on {topic} for publication.\n\n\
                           Add title, author, date, tags and a meta description, SEO-friendly keywords and \
                           categories. Produce the final markdown article followed by a short publication summary."
                        .to_string(),
                    expected_output: "Publication-ready article on {topic} with metadata".to_string(),
                    pattern: None,
                    timeout_seconds: timeouts.publishing,
                    retry_policy: RetryPolicy::with_attempts(2),
                    uses_context: true,
                },
            ],
        }
    }
}

/// One agent persona and the task it performs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (unique within pipeline)
    pub name: String,

    pub role: String,

    pub goal: String,

    pub backstory: String,

    /// External capabilities the persona relies on
    #[serde(default)]
    pub tools: Vec<String>,

    /// Task template with `{topic}` / `{word_count}` placeholders
    pub task: String,

    /// Template describing the expected deliverable
    pub expected_output: String,

    /// Fabric pattern to run; the rendered prompt is sent as-is when absent
    #[serde(default)]
    pub pattern: Option<String>,

    /// Maximum execution time per attempt
    pub timeout_seconds: u64,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Append the previous stage's output to the prompt
    #[serde(default = "default_uses_context")]
    pub uses_context: bool,
}

fn default_uses_context() -> bool {
    true
}

impl Stage {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The task with placeholders filled in
    pub fn render_task(&self, topic: &str, word_count: u32) -> String {
        render_template(&self.task, topic, word_count)
    }

    /// The full prompt sent to the model for this stage
    pub fn render_prompt(&self, topic: &str, word_count: u32, context: Option<&str>) -> String {
        let mut prompt = format!(
            "You are a {}.\nGoal: {}\n{}\n\nTask:\n{}\n\nExpected output: {}",
            self.role,
            self.goal,
            self.backstory,
            self.render_task(topic, word_count),
            render_template(&self.expected_output, topic, word_count),
        );

        if self.uses_context {
            if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
                prompt.push_str("\n\nOutput of the previous stage:\n");
                prompt.push_str(context);
            }
        }

        prompt
    }
}

/// Fill `{topic}` and `{word_count}` in a template
pub fn render_template(template: &str, topic: &str, word_count: u32) -> String {
    template
        .replace(TOPIC_PLACEHOLDER, topic)
        .replace(WORD_COUNT_PLACEHOLDER, &word_count.to_string())
}

/// Retry policy for a failing stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound on any delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Delay multiplier applied per further attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
