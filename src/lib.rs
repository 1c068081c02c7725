//! daylog - turn rough daily notes into structured Markdown reports
//!
//! Raw notes go to an OpenAI-compatible chat endpoint; the answer is
//! extracted, cleaned and rebuilt into a document with fixed frontmatter and
//! a fixed section layout.
//!
//! # Architecture
//!
//! Each invocation is one run through a small state machine:
//! - The input is fingerprinted and checked against a per-directory index
//! - Unchanged inputs are skipped without calling the model
//! - Generated text always yields a writable document; when it is incomplete
//!   a placeholder skeleton is used and the run ends as "needs review"
//!
//! # Modules
//!
//! - `adapters`: Generation backends (HTTP)
//! - `config`: Layered settings and the workspace layout
//! - `core`: Extraction, normalization, index, weekly rollup, orchestration
//! - `domain`: Data structures (fingerprints, frontmatter, runs)
//! - `library`: Scratch and report maintenance
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Generate today's report
//! daylog daily --input scratch/2024-01-01.md
//!
//! # Weekly rollup
//! daylog weekly --output content/weekly/2024-W01.md
//!
//! # Drop scratch notes that were already reported
//! daylog cleanup --dry-run
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{Generator, HttpGenerator};
pub use config::{ApiSettings, EnvResolver, WeeklySettings};
pub use core::{FingerprintIndex, ReportError, ReportOrchestrator, ReportRequest, ResponseExtractor};
pub use domain::{ContentFingerprint, PromptPair, ReportKind, ReportOutcome, ReportRun, ReportState, SourceType};
