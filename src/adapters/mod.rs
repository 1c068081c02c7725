//! Adapter interfaces for text generation backends.
//!
//! The orchestrator only sees the [`Generator`] trait; the HTTP client is the
//! production implementation and tests substitute scripted ones. Generators
//! return the parsed response document; locating the text in it is the
//! extractor's job.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::error::ReportError;
use crate::domain::PromptPair;

// Re-export the HTTP generator
pub use http::HttpGenerator;

/// Sends a prompt pair to a model backend
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable generator name
    fn name(&self) -> &str;

    /// One generation call. No retries.
    async fn generate(&self, prompts: &PromptPair) -> Result<Value, ReportError>;
}
