//! Domain types for the report pipeline.
//!
//! This module contains the core data structures:
//! - Fingerprint: content hash used as the idempotency key
//! - Frontmatter: metadata block parser and renderer
//! - Report: report kinds, provenance and required sections
//! - Run: per-invocation state machine and outcome

pub mod fingerprint;
pub mod frontmatter;
pub mod prompt;
pub mod report;
pub mod run;
pub mod slug;

// Re-export commonly used types
pub use fingerprint::ContentFingerprint;
pub use frontmatter::{extract_frontmatter, FrontmatterError, FrontmatterMeta};
pub use prompt::PromptPair;
pub use report::{ReportKind, SourceType};
pub use run::{ReportOutcome, ReportRun, ReportState, SkipReason};
pub use slug::{normalize_tag, normalize_tags, slugify, TagSet};
