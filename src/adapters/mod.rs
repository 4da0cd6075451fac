//! LLM backends.
//!
//! An adapter turns one prompt into one completion. `StagedDriver` calls it
//! once per stage attempt and owns retries; adapters only enforce the
//! per-attempt timeout they are given.

pub mod fabric;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub use fabric::FabricAdapter;

/// Completion text returned for one prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOutput {
    pub content: String,
}

impl AdapterOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A backend able to complete prompts
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Short backend name, used in log fields
    fn name(&self) -> &str;

    /// Complete `input`, through a named pattern when one is given
    async fn execute(
        &self,
        pattern: Option<&str>,
        input: &str,
        timeout: Duration,
    ) -> Result<AdapterOutput>;

    /// Fail early when the backend is not installed or not reachable
    async fn health_check(&self) -> Result<()>;
}
