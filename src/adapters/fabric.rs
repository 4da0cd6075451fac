//! Fabric adapter for LLM execution.
//!
//! Subprocess mode: spawns the `fabric` CLI, pipes the prompt to stdin and
//! collects the completion from stdout.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::{Adapter, AdapterOutput};

/// Fabric adapter using subprocess mode
pub struct FabricAdapter {
    /// Path to the fabric binary
    binary_path: String,

    /// Model override passed as `-m`
    model: Option<String>,
}

impl Default for FabricAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FabricAdapter {
    /// Create a Fabric adapter, preferring `fabric-ai` (Homebrew name) over `fabric`
    pub fn new() -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
        {
            "fabric-ai".to_string()
        } else {
            "fabric".to_string()
        };

        Self {
            binary_path,
            model: None,
        }
    }

    /// Create a Fabric adapter with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model: None,
        }
    }

    /// Adapter configured from resolved settings
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        let adapter = match settings.fabric_binary {
            Some(ref binary) => Self::with_binary_path(binary.clone()),
            None => Self::new(),
        };
        adapter.with_model(settings.fabric_model.clone())
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    fn args(&self, pattern: Option<&str>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(pattern) = pattern {
            args.push("-p".to_string());
            args.push(pattern.to_string());
        }
        if let Some(ref model) = self.model {
            args.push("-m".to_string());
            args.push(model.clone());
        }
        args
    }

    async fn execute_subprocess(
        &self,
        pattern: Option<&str>,
        input: &str,
        step_timeout: Duration,
    ) -> Result<String> {
        let label = pattern.unwrap_or("<prompt>");
        let mut child = Command::new(&self.binary_path)
            .args(self.args(pattern))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn fabric process for {}", label))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .context("Failed to write to fabric stdin")?;
            // Drop stdin to signal EOF
        }

        let output = timeout(step_timeout, child.wait_with_output())
            .await
            .with_context(|| format!("Fabric {} timed out after {:?}", label, step_timeout))?
            .with_context(|| format!("Failed to wait for fabric process for {}", label))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Fabric {} failed with exit code {}: {}",
                label,
                exit_code,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("Fabric output is not valid UTF-8")
    }
}

#[async_trait]
impl Adapter for FabricAdapter {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn execute(
        &self,
        pattern: Option<&str>,
        input: &str,
        timeout: Duration,
    ) -> Result<AdapterOutput> {
        let content = self.execute_subprocess(pattern, input, timeout).await?;
        Ok(AdapterOutput::new(content))
    }

    async fn health_check(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("-l")
            .output()
            .await
            .with_context(|| format!("Failed to run fabric health check ({})", self.binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Fabric health check failed: {}", stderr.trim());
        }

        Ok(())
    }
}
