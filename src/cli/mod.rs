//! Command-line interface for quillcrew.
//!
//! Thin entry points over the orchestrator: run one topic, run a batch,
//! prompt interactively, and show status or configuration.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::FabricAdapter;
use crate::config::Settings;
use crate::core::{Pipeline, PipelineDriver, StagedDriver, WorkflowOrchestrator};
use crate::domain::run::format_duration;
use crate::domain::{MetricsSnapshot, RunRecord};

type Orchestrator = WorkflowOrchestrator<StagedDriver<FabricAdapter>>;

/// quillcrew - research, write, edit and publish articles with LLM agents
#[derive(Parser, Debug)]
#[command(name = "quillcrew")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline definition (YAML) replacing the stock four-stage pipeline
    #[arg(long, global = true)]
    pub pipeline: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for one topic
    Run {
        /// Topic to research and write about
        topic: String,

        /// Target article length (defaults to the configured word count)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        word_count: Option<u32>,
    },

    /// Run the pipeline for several topics, one after another
    Batch {
        /// Topics to process
        topics: Vec<String>,

        /// File with one topic per line ('#' starts a comment)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Target article length (defaults to the configured word count)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        word_count: Option<u32>,
    },

    /// Prompt for topics until 'quit'
    Interactive,

    /// Show agents, configuration and tool availability
    Status,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Run { topic, word_count } => {
                let word_count = word_count.unwrap_or(settings.default_word_count);
                let orchestrator = connect(settings, self.pipeline.as_deref()).await?;
                run_topic(&orchestrator, &topic, word_count).await
            }
            Commands::Batch {
                topics,
                file,
                word_count,
            } => {
                let word_count = word_count.unwrap_or(settings.default_word_count);
                let topics = collect_topics(topics, file.as_deref())?;
                let orchestrator = connect(settings, self.pipeline.as_deref()).await?;
                run_batch(&orchestrator, &topics, word_count).await
            }
            Commands::Interactive => {
                let orchestrator = connect(settings, self.pipeline.as_deref()).await?;
                interactive(&orchestrator).await
            }
            Commands::Status => show_status(settings, self.pipeline.as_deref()).await,
            Commands::Config => show_config(&settings),
        }
    }
}

/// Build the production driver for the configured pipeline
fn build_driver(settings: &Settings, pipeline: Option<&Path>) -> Result<StagedDriver<FabricAdapter>> {
    let pipeline = match pipeline {
        Some(path) => Pipeline::from_file(path)?,
        None => Pipeline::content_default(settings),
    };
    StagedDriver::new(pipeline, FabricAdapter::from_settings(settings))
}

async fn connect(settings: Settings, pipeline: Option<&Path>) -> Result<Orchestrator> {
    let driver = build_driver(&settings, pipeline)?;
    WorkflowOrchestrator::connect(settings, driver).await
}

/// Topics from arguments followed by topics from a file
fn collect_topics(mut topics: Vec<String>, file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topics file: {}", path.display()))?;
        topics.extend(parse_topics(&content));
    }

    topics.retain(|t| !t.trim().is_empty());
    if topics.is_empty() {
        anyhow::bail!("No topics provided. Pass topics as arguments or use --file <path>");
    }
    Ok(topics)
}

/// One topic per non-empty, non-comment line
fn parse_topics(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Parse a word count answer, falling back to `default` on blank or bad input
fn parse_word_count(input: &str, default: u32) -> u32 {
    match input.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => default,
    }
}

fn is_quit(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "quit" | "exit" | "q")
}

async fn run_topic(orchestrator: &Orchestrator, topic: &str, word_count: u32) -> Result<()> {
    if topic.trim().is_empty() {
        anyhow::bail!("Topic is empty");
    }

    let record = orchestrator.run_workflow(topic, word_count).await;
    print_record(&record);

    if record.is_success() {
        println!("Estimated cost: ${:.3}", orchestrator.estimate_cost());
        print_metrics(&orchestrator.performance_metrics());
        println!("\nOutputs: {}", orchestrator.layout().root.display());
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn run_batch(orchestrator: &Orchestrator, topics: &[String], word_count: u32) -> Result<()> {
    println!("Processing {} topics...", topics.len());
    let results = orchestrator.batch_process(topics, word_count).await;

    let (successful, failed): (Vec<&RunRecord>, Vec<&RunRecord>) =
        results.iter().partition(|r| r.is_success());

    println!("\nBatch results:");
    println!("  Successful: {}", successful.len());
    println!("  Failed:     {}", failed.len());

    for record in &successful {
        println!("  ok    {} ({})", record.topic, format_duration(record.duration()));
    }
    for record in &failed {
        let error = record.error().map(|e| e.message.as_str()).unwrap_or("unknown error");
        println!("  FAIL  {}: {}", record.topic, error);
    }

    if successful.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn prompt(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn interactive(orchestrator: &Orchestrator) -> Result<()> {
    let default_words = orchestrator.settings().default_word_count;

    loop {
        println!("\n{}", "=".repeat(50));
        println!("Enter a topic (or 'quit' to exit):");
        let Some(topic) = prompt("Topic: ")? else {
            break;
        };

        if is_quit(&topic) {
            break;
        }
        if topic.is_empty() {
            println!("Please enter a valid topic.");
            continue;
        }

        println!("\nEnter word count (default: {}):", default_words);
        let answer = prompt("Word count: ")?.unwrap_or_default();
        let word_count = parse_word_count(&answer, default_words);
        if !answer.is_empty() && answer.parse::<u32>().ok() != Some(word_count) {
            println!("Invalid word count, using default: {}", default_words);
        }

        println!("\nProcessing: {} ({} words)", topic, word_count);
        let record = orchestrator.run_workflow(&topic, word_count).await;
        print_record(&record);
    }

    println!("Goodbye!");
    Ok(())
}

async fn show_status(settings: Settings, pipeline: Option<&Path>) -> Result<()> {
    let driver = build_driver(&settings, pipeline)?;
    let orchestrator = WorkflowOrchestrator::new(settings, driver)?;
    let status = orchestrator.workflow_status();

    println!("Agents: {}", status.agents.len());
    for (i, agent) in status.agents.iter().enumerate() {
        println!("  {}. {} [{}]", i + 1, agent.role, agent.stage);
        let tools = if agent.tools.is_empty() {
            "None".to_string()
        } else {
            agent.tools.join(", ")
        };
        println!("     Tools: {}", tools);
        println!("     Uses previous output: {}", agent.uses_context);
        println!("     Max execution time: {}s", agent.max_execution_time);
    }

    println!("\nDirectories created: {}", status.directories_created);
    match orchestrator.driver().health_check().await {
        Ok(()) => println!("Tools: available"),
        Err(e) => println!("Tools: unavailable ({:#})", e),
    }

    Ok(())
}

fn show_config(settings: &Settings) -> Result<()> {
    let layout = settings.layout();

    println!("quillcrew Configuration");
    println!("=======================");
    match settings.config_file {
        Some(ref path) => println!("Config file:    {}", path.display()),
        None => println!("Config file:    (none, using defaults)"),
    }
    println!("Output dir:     {}", layout.root.display());
    for dir in layout.directories() {
        println!("                {}", dir.display());
    }
    println!("Word count:     {}", settings.default_word_count);
    println!(
        "Timeouts:       research {}s, writing {}s, editing {}s, publishing {}s",
        settings.timeouts.research,
        settings.timeouts.writing,
        settings.timeouts.editing,
        settings.timeouts.publishing
    );
    println!(
        "Fabric:         {}{}",
        settings.fabric_binary.as_deref().unwrap_or("(auto-detect)"),
        settings
            .fabric_model
            .as_deref()
            .map(|m| format!(" -m {}", m))
            .unwrap_or_default()
    );
    println!(
        "Cost estimate:  ${:.3}/run ({} tokens at ${}/1k)",
        settings.cost.estimate_per_run(),
        settings.cost.estimated_tokens,
        settings.cost.cost_per_1k_tokens
    );
    println!("HTML escaping:  {}", settings.html_escape);

    Ok(())
}

fn print_record(record: &RunRecord) {
    let duration = format_duration(record.duration());

    if record.is_success() {
        println!("\nCompleted '{}' in {}", record.topic, duration);
        println!("Output files: {}", record.output_files().len());
        for path in record.output_files() {
            println!("  {}", path.display());
        }
    } else if let Some(error) = record.error() {
        eprintln!("\nWorkflow failed for '{}' after {}", record.topic, duration);
        eprintln!("Error: {}", error.message);
        eprintln!("\nDetails:\n{}", error.trace);
    }
}

fn print_metrics(metrics: &MetricsSnapshot) {
    println!("\nPerformance:");
    println!("  Success rate:     {:.1}%", metrics.success_rate);
    println!("  Average duration: {:.1}s", metrics.avg_duration_seconds);
    println!("  Total runs:       {}", metrics.total_runs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_topics_skips_blank_and_comments() {
        let topics = parse_topics("# header\nAI Ethics\n\n  Space Exploration  \n#skip\n");
        assert_eq!(topics, ["AI Ethics", "Space Exploration"]);
    }

    #[test]
    fn test_collect_topics_merges_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("topics.txt");
        std::fs::write(&path, "Blockchain\n").unwrap();

        let topics = collect_topics(vec!["Energy".to_string()], Some(&path)).unwrap();
        assert_eq!(topics, ["Energy", "Blockchain"]);
    }

    #[test]
    fn test_collect_topics_requires_one() {
        assert!(collect_topics(vec!["  ".to_string()], None).is_err());
    }

    #[test]
    fn test_parse_word_count() {
        assert_eq!(parse_word_count("1500", 2000), 1500);
        assert_eq!(parse_word_count("", 2000), 2000);
        assert_eq!(parse_word_count("lots", 2000), 2000);
        assert_eq!(parse_word_count("0", 2000), 2000);
    }

    #[test]
    fn test_quit_words() {
        assert!(is_quit("quit"));
        assert!(is_quit(" Q "));
        assert!(is_quit("EXIT"));
        assert!(!is_quit("quantum"));
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["quillcrew", "run", "Quantum Computing", "-w", "1200"]).unwrap();
        match cli.command {
            Commands::Run { topic, word_count } => {
                assert_eq!(topic, "Quantum Computing");
                assert_eq!(word_count, Some(1200));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_zero_word_count() {
        assert!(Cli::try_parse_from(["quillcrew", "run", "x", "--word-count", "0"]).is_err());
    }
}
