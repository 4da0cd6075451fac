//! Content artifacts produced for a finished article.
//!
//! One article is written in several parallel representations that share a
//! filename stem (`{slug}_{YYYYMMDD_HHMMSS}`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Value of `created_by` in every metadata record
pub const CREATED_BY: &str = "WorkflowOrchestrator";

/// Representations written for one article, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// Raw content, verbatim
    Markdown,

    /// Same content under a plain-text extension
    Text,

    /// Content wrapped in a fixed HTML page
    Html,

    /// JSON metadata describing the other files
    Metadata,
}

impl ArtifactFormat {
    /// All formats in the order they are written
    pub const ALL: [ArtifactFormat; 4] = [
        ArtifactFormat::Markdown,
        ArtifactFormat::Text,
        ArtifactFormat::Html,
        ArtifactFormat::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Html => "html",
            Self::Metadata => "metadata",
        }
    }

    /// Filename suffix appended to the stem
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Markdown => ".md",
            Self::Text => ".txt",
            Self::Html => ".html",
            Self::Metadata => "_metadata.json",
        }
    }

    /// Full filename for a stem
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}{}", stem, self.suffix())
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A format that could not be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFailure {
    pub format: ArtifactFormat,
    pub path: PathBuf,
    pub error: String,
}

/// Result of writing one article: the files that made it to disk plus
/// counts derived from the source content.
///
/// Writes are not atomic as a group. A failed format is listed in
/// `failures` and missing from `files`; earlier files stay on disk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtifactSet {
    /// Shared filename stem
    pub stem: String,

    /// Written files keyed by format (iterates in write order)
    pub files: BTreeMap<ArtifactFormat, PathBuf>,

    /// Formats that failed to write
    pub failures: Vec<ArtifactFailure>,

    /// Whitespace-delimited token count of the content
    pub word_count: usize,

    /// Number of characters (not bytes) in the content
    pub character_count: usize,
}

impl ArtifactSet {
    pub fn path(&self, format: ArtifactFormat) -> Option<&Path> {
        self.files.get(&format).map(PathBuf::as_path)
    }

    /// Written paths in write order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.values().cloned().collect()
    }

    /// True when every format was written
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.files.len() == ArtifactFormat::ALL.len()
    }
}

/// Contents of the `_metadata.json` artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub topic: String,
    pub timestamp: NaiveDateTime,
    pub word_count: usize,
    pub character_count: usize,
    /// Content files written before the metadata record
    pub files_created: BTreeMap<ArtifactFormat, PathBuf>,
    pub created_by: String,
}
