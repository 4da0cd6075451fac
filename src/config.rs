//! Configuration for quillcrew.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (QUILLCREW_OUTPUT_DIR, QUILLCREW_FABRIC_BIN)
//! 2. Config file (.quillcrew/config.yaml)
//! 3. Defaults (./outputs, 2000 words, stock stage timeouts)
//!
//! Config file discovery:
//! - Searches current directory and parents for .quillcrew/config.yaml
//! - Paths in config file are relative to the directory holding .quillcrew/

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::metrics::CostModel;

pub use paths::OutputLayout;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<Settings, String>> = OnceLock::new();

/// Environment variable overriding the output root
pub const ENV_OUTPUT_DIR: &str = "QUILLCREW_OUTPUT_DIR";

/// Environment variable overriding the Fabric binary
pub const ENV_FABRIC_BIN: &str = "QUILLCREW_FABRIC_BIN";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub output_dir: Option<String>,
    pub default_word_count: Option<u32>,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub fabric: Option<FabricConfig>,
    #[serde(default)]
    pub cost: Option<CostConfig>,
    #[serde(default)]
    pub html: Option<HtmlConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutsConfig {
    pub research: Option<u64>,
    pub writing: Option<u64>,
    pub editing: Option<u64>,
    pub publishing: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FabricConfig {
    pub binary: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CostConfig {
    pub estimated_tokens: Option<u64>,
    pub cost_per_1k_tokens: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HtmlConfig {
    #[serde(default)]
    pub escape: bool,
}

/// Per-stage execution timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTimeouts {
    pub research: u64,
    pub writing: u64,
    pub editing: u64,
    pub publishing: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            research: 300,
            writing: 600,
            editing: 300,
            publishing: 200,
        }
    }
}

impl StageTimeouts {
    /// Sum of all stage budgets, the worst case for one run
    pub fn total(&self) -> Duration {
        Duration::from_secs(self.research + self.writing + self.editing + self.publishing)
    }
}

/// Resolved configuration with absolute-or-cwd-relative paths
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Root of the output tree (blog_posts/, research_reports/, logs/, metrics/)
    pub output_dir: PathBuf,
    /// Word count used when the caller gives none
    pub default_word_count: u32,
    pub timeouts: StageTimeouts,
    /// Fabric binary override; `None` means auto-detect
    pub fabric_binary: Option<String>,
    /// Fabric model override (`-m`)
    pub fabric_model: Option<String>,
    pub cost: CostModel,
    /// Escape HTML-significant characters in the HTML artifact
    pub html_escape: bool,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(paths::DEFAULT_OUTPUT_DIR),
            default_word_count: 2000,
            timeouts: StageTimeouts::default(),
            fabric_binary: None,
            fabric_model: None,
            cost: CostModel::default(),
            html_escape: false,
            config_file: None,
        }
    }
}

impl Settings {
    /// Settings rooted at a specific output directory, everything else default
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// The fixed directory layout under `output_dir`
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir)
    }

    fn validate(&self) -> Result<()> {
        if self.default_word_count == 0 {
            anyhow::bail!("default_word_count must be positive");
        }
        let t = &self.timeouts;
        if [t.research, t.writing, t.editing, t.publishing].contains(&0) {
            anyhow::bail!("stage timeouts must be positive");
        }
        if self.cost.cost_per_1k_tokens < 0.0 {
            anyhow::bail!("cost_per_1k_tokens cannot be negative");
        }
        Ok(())
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".quillcrew").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge the config file (if any) and environment overrides over the defaults
fn resolve(
    file: Option<(PathBuf, ConfigFile)>,
    env_output_dir: Option<String>,
    env_fabric_bin: Option<String>,
) -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some((config_path, config)) = file {
        // Project root is the parent of .quillcrew/
        let base_dir = config_path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));

        if let Some(ref dir) = config.output_dir {
            settings.output_dir = resolve_path(base_dir, dir);
        }
        if let Some(words) = config.default_word_count {
            settings.default_word_count = words;
        }

        let defaults = StageTimeouts::default();
        settings.timeouts = StageTimeouts {
            research: config.timeouts.research.unwrap_or(defaults.research),
            writing: config.timeouts.writing.unwrap_or(defaults.writing),
            editing: config.timeouts.editing.unwrap_or(defaults.editing),
            publishing: config.timeouts.publishing.unwrap_or(defaults.publishing),
        };

        if let Some(fabric) = config.fabric {
            settings.fabric_binary = fabric.binary;
            settings.fabric_model = fabric.model;
        }

        if let Some(cost) = config.cost {
            let defaults = CostModel::default();
            settings.cost = CostModel {
                estimated_tokens: cost.estimated_tokens.unwrap_or(defaults.estimated_tokens),
                cost_per_1k_tokens: cost
                    .cost_per_1k_tokens
                    .unwrap_or(defaults.cost_per_1k_tokens),
            };
        }

        settings.html_escape = config.html.map(|h| h.escape).unwrap_or(false);
        settings.config_file = Some(config_path);
    }

    if let Some(dir) = env_output_dir.filter(|d| !d.trim().is_empty()) {
        settings.output_dir = PathBuf::from(dir);
    }
    if let Some(bin) = env_fabric_bin.filter(|b| !b.trim().is_empty()) {
        settings.fabric_binary = Some(bin);
    }

    settings.validate()?;
    Ok(settings)
}

/// Load configuration from all sources, discovering the config file from `start`
pub fn load_config_from(start: &Path) -> Result<Settings> {
    let file = match find_config_file(start) {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve(
        file,
        std::env::var(ENV_OUTPUT_DIR).ok(),
        std::env::var(ENV_FABRIC_BIN).ok(),
    )
}

fn load_config() -> Result<Settings> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static Settings> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (bypasses the cache)
pub fn reload_config() -> Result<Settings> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(root: &Path, body: &str) -> PathBuf {
        let dir = root.join(".quillcrew");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = resolve(None, None, None).unwrap();

        assert_eq!(settings.output_dir, PathBuf::from("outputs"));
        assert_eq!(settings.default_word_count, 2000);
        assert_eq!(settings.timeouts, StageTimeouts::default());
        assert!(!settings.html_escape);
        assert!(settings.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1.0"
output_dir: build/out
default_word_count: 1500
timeouts:
  writing: 900
fabric:
  binary: /opt/fabric
  model: gpt-4o
cost:
  estimated_tokens: 20000
html:
  escape: true
"#,
        );

        let parsed = load_config_file(&path).unwrap();
        let settings = resolve(Some((path.clone(), parsed)), None, None).unwrap();

        assert_eq!(settings.output_dir, temp.path().join("build/out"));
        assert_eq!(settings.default_word_count, 1500);
        assert_eq!(settings.timeouts.writing, 900);
        assert_eq!(settings.timeouts.research, 300);
        assert_eq!(settings.fabric_binary.as_deref(), Some("/opt/fabric"));
        assert_eq!(settings.fabric_model.as_deref(), Some("gpt-4o"));
        assert_eq!(settings.cost.estimated_tokens, 20000);
        assert!((settings.cost.cost_per_1k_tokens - 0.002).abs() < f64::EPSILON);
        assert!(settings.html_escape);
        assert_eq!(settings.config_file, Some(path));
    }

    #[test]
    fn test_config_discovered_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "version: \"1.0\"\noutput_dir: artifacts\n");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert!(found.ends_with(".quillcrew/config.yaml"));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "version: \"1.0\"\noutput_dir: from-file\n");
        let parsed = load_config_file(&path).unwrap();

        let settings = resolve(
            Some((path, parsed)),
            Some("/tmp/from-env".to_string()),
            Some("fabric-ai".to_string()),
        )
        .unwrap();

        assert_eq!(settings.output_dir, PathBuf::from("/tmp/from-env"));
        assert_eq!(settings.fabric_binary.as_deref(), Some("fabric-ai"));
    }

    #[test]
    fn test_zero_word_count_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "version: \"1.0\"\ndefault_word_count: 0\n");
        let parsed = load_config_file(&path).unwrap();

        assert!(resolve(Some((path, parsed)), None, None).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "outputs"),
            PathBuf::from("/home/user/project/outputs")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    fn test_total_timeout_budget() {
        assert_eq!(StageTimeouts::default().total(), Duration::from_secs(1400));
    }
}
