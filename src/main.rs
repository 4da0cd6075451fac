//! quillcrew CLI entrypoint

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quillcrew::cli::Cli;
use quillcrew::OutputLayout;

/// Log to stderr and, when it can be opened, to `logs/workflow.log`
fn init_tracing(layout: &OutputLayout) {
    let log_file = std::fs::create_dir_all(&layout.logs)
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(layout.log_file())
        })
        .ok();

    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = quillcrew::config::config()?.clone();

    init_tracing(&settings.layout());

    cli.execute(settings).await
}
