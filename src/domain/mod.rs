//! Domain types for quillcrew.
//!
//! This module contains the core data structures:
//! - RunRecord: Outcome of one pipeline execution
//! - MetricsSnapshot: Aggregate view of all runs so far
//! - ArtifactSet: Files written for one article

pub mod artifact;
pub mod metrics;
pub mod run;

// Re-export commonly used types
pub use artifact::{ArtifactFailure, ArtifactFormat, ArtifactMetadata, ArtifactSet};
pub use metrics::MetricsSnapshot;
pub use run::{ErrorDetails, RunOutcome, RunRecord};
