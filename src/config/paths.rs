//! Canonical output paths.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Layout
//!
//! | Directory | Contents |
//! |-----------|----------|
//! | `blog_posts/` | Per-run content artifacts (md, txt, html, metadata json) |
//! | `research_reports/` | Research stage output per run |
//! | `logs/` | `workflow.log` and `error_report_*.json` |
//! | `metrics/` | `workflow_results_*.json` |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default output root, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

pub const BLOG_POSTS: &str = "blog_posts";
pub const RESEARCH_REPORTS: &str = "research_reports";
pub const LOGS: &str = "logs";
pub const METRICS: &str = "metrics";

/// Name of the append-only process log inside `logs/`
pub const LOG_FILE: &str = "workflow.log";

/// The four fixed output directories under one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub blog_posts: PathBuf,
    pub research_reports: PathBuf,
    pub logs: PathBuf,
    pub metrics: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            blog_posts: root.join(BLOG_POSTS),
            research_reports: root.join(RESEARCH_REPORTS),
            logs: root.join(LOGS),
            metrics: root.join(METRICS),
            root,
        }
    }

    /// Create every directory; safe to call repeatedly
    pub fn ensure(&self) -> Result<()> {
        for dir in self.directories() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Directories in creation order
    pub fn directories(&self) -> [&Path; 4] {
        [
            self.blog_posts.as_path(),
            self.research_reports.as_path(),
            self.logs.as_path(),
            self.metrics.as_path(),
        ]
    }

    /// Path of the process log file
    pub fn log_file(&self) -> PathBuf {
        self.logs.join(LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("outputs");

        assert_eq!(layout.blog_posts, PathBuf::from("outputs/blog_posts"));
        assert_eq!(layout.research_reports, PathBuf::from("outputs/research_reports"));
        assert_eq!(layout.logs, PathBuf::from("outputs/logs"));
        assert_eq!(layout.metrics, PathBuf::from("outputs/metrics"));
        assert_eq!(layout.log_file(), PathBuf::from("outputs/logs/workflow.log"));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path().join("out"));

        layout.ensure().unwrap();
        layout.ensure().unwrap();

        for dir in layout.directories() {
            assert!(dir.is_dir(), "{} should exist", dir.display());
        }
    }

    #[test]
    fn test_ensure_fails_when_root_is_a_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("not-a-dir");
        std::fs::write(&root, "x").unwrap();

        assert!(OutputLayout::new(&root).ensure().is_err());
    }
}
