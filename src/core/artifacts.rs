//! Multi-format artifact writer.
//!
//! Every article is written as `{stem}.md`, `{stem}.txt`, `{stem}.html` and
//! `{stem}_metadata.json`, where the stem is `{slug}_{YYYYMMDD_HHMMSS}`.
//!
//! The HTML page embeds the content raw by default: newlines become `<br>`
//! and nothing else is escaped, so markup inside the content is rendered
//! as markup. `with_html_escape(true)` escapes it first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tokio::fs;
use tracing::{info, warn};

use crate::config::OutputLayout;
use crate::domain::{
    artifact::CREATED_BY, ArtifactFailure, ArtifactFormat, ArtifactMetadata, ArtifactSet,
};

/// Timestamp layout used in every generated filename
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Derive a filesystem-safe identifier from free text.
///
/// Alphanumerics, `-` and `_` are kept (lowercased). Any run of spaces or
/// other characters between kept characters collapses to a single `_`;
/// leading and trailing runs are dropped. May return an empty string.
pub fn slugify(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    let mut pending_separator = false;

    for c in topic.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// `{slug}_{YYYYMMDD_HHMMSS}`
pub fn file_stem(topic: &str, timestamp: &NaiveDateTime) -> String {
    format!("{}_{}", slugify(topic), timestamp.format(FILE_TIMESTAMP_FORMAT))
}

/// Escape the five HTML-significant characters
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Wrap content in the fixed HTML page, newlines replaced by `<br>`
pub fn render_html(topic: &str, content: &str, escape: bool) -> String {
    let (title, body) = if escape {
        (escape_html(topic), escape_html(content))
    } else {
        (topic.to_string(), content.to_string())
    };
    let body = body.replace('\n', "<br>");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; margin: 40px; }}
        h1, h2, h3 {{ color: #333; }}
        p {{ margin-bottom: 16px; }}
        pre {{ background-color: #f4f4f4; padding: 10px; border-radius: 5px; }}
    </style>
</head>
<body>
    <div id="content">
        {body}
    </div>
</body>
</html>"#
    )
}

/// Writes article artifacts and research reports under fixed directories
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    /// Directory for the four article formats
    posts_dir: PathBuf,

    /// Directory for research stage reports
    research_dir: PathBuf,

    html_escape: bool,
}

impl ArtifactWriter {
    /// Writer rooted at an output layout
    pub fn new(layout: &OutputLayout) -> Self {
        Self {
            posts_dir: layout.blog_posts.clone(),
            research_dir: layout.research_reports.clone(),
            html_escape: false,
        }
    }

    /// Escape HTML-significant characters in the HTML artifact
    pub fn with_html_escape(mut self, escape: bool) -> Self {
        self.html_escape = escape;
        self
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    /// Write all four formats for one article.
    ///
    /// Each format is attempted independently; failures are logged and
    /// reported in the returned set instead of aborting the call.
    pub async fn write(&self, topic: &str, content: &str, timestamp: NaiveDateTime) -> ArtifactSet {
        let stem = file_stem(topic, &timestamp);
        let mut set = ArtifactSet {
            stem: stem.clone(),
            files: BTreeMap::new(),
            failures: Vec::new(),
            word_count: content.split_whitespace().count(),
            character_count: content.chars().count(),
        };

        let html = render_html(topic, content, self.html_escape);
        let bodies = [
            (ArtifactFormat::Markdown, content),
            (ArtifactFormat::Text, content),
            (ArtifactFormat::Html, html.as_str()),
        ];

        for (format, body) in bodies {
            let path = self.posts_dir.join(format.file_name(&stem));
            self.write_one(&mut set, format, path, body).await;
        }

        let metadata = ArtifactMetadata {
            topic: topic.to_string(),
            timestamp,
            word_count: set.word_count,
            character_count: set.character_count,
            files_created: set.files.clone(),
            created_by: CREATED_BY.to_string(),
        };
        let path = self.posts_dir.join(ArtifactFormat::Metadata.file_name(&stem));
        match serde_json::to_string_pretty(&metadata) {
            Ok(json) => self.write_one(&mut set, ArtifactFormat::Metadata, path, &json).await,
            Err(e) => {
                warn!(error = %e, "Failed to serialize artifact metadata");
                set.failures.push(ArtifactFailure {
                    format: ArtifactFormat::Metadata,
                    path,
                    error: e.to_string(),
                });
            }
        }

        if set.failures.is_empty() {
            info!(stem = %set.stem, files = set.files.len(), "Artifacts saved");
        } else {
            warn!(
                stem = %set.stem,
                written = set.files.len(),
                failed = set.failures.len(),
                "Some artifacts could not be saved"
            );
        }

        set
    }

    async fn write_one(
        &self,
        set: &mut ArtifactSet,
        format: ArtifactFormat,
        path: PathBuf,
        body: &str,
    ) {
        match write_file(&path, body).await {
            Ok(()) => {
                set.files.insert(format, path);
            }
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(%format, path = %path.display(), %error, "Artifact write failed");
                set.failures.push(ArtifactFailure {
                    format,
                    path,
                    error,
                });
            }
        }
    }

    /// Persist the research stage output as `{stem}_research.md`
    pub async fn write_research_report(
        &self,
        topic: &str,
        content: &str,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf> {
        let path = self
            .research_dir
            .join(format!("{}_research.md", file_stem(topic, &timestamp)));
        write_file(&path, content).await?;
        info!(path = %path.display(), "Research report saved");
        Ok(path)
    }
}

async fn write_file(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write artifact: {}", path.display()))
}
