//! Core pipeline logic.
//!
//! This module contains:
//! - Error: the fatal error taxonomy
//! - Extract: response text location and cleanup
//! - Normalize: document standardization
//! - Index: per-directory fingerprint index
//! - Weekly: weekly rollup inputs
//! - Orchestrator: the run state machine

pub mod error;
pub mod extract;
pub mod index;
pub mod normalize;
pub mod orchestrator;
pub mod weekly;

// Re-export commonly used types
pub use error::ReportError;
pub use extract::{ResponseExtractor, FALLBACK_PATHS};
pub use index::FingerprintIndex;
pub use normalize::{normalize, NormalizeContext, Normalized};
pub use orchestrator::{ReportOrchestrator, ReportRequest, WeeklyRequest};
pub use weekly::WeekWindow;
