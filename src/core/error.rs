//! Error taxonomy for the report pipeline.
//!
//! Every variant is fatal for the invocation that raised it. The soft
//! "needs review" result is an outcome, not an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::run::EXIT_FAILURE;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{detail}")]
    Configuration { name: String, detail: String },

    #[error("{}", api_message(.status, .detail))]
    Api { status: Option<u16>, detail: String },

    /// 2xx response whose body is not JSON. Carries the start of the body.
    #[error("Cloud API returned non-JSON response: {preview}")]
    NonJson { preview: String },

    #[error("Unable to extract model output from response paths: {attempted:?}. Last error: {last_error}")]
    Extraction {
        attempted: Vec<String>,
        last_error: String,
    },

    #[error("Cloud API returned empty content after filtering")]
    EmptyResponse,

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn api_message(status: &Option<u16>, detail: &str) -> String {
    match status {
        Some(code) => format!("Cloud API HTTP {}: {}", code, detail),
        None => format!("Cloud API request failed: {}", detail),
    }
}

impl ReportError {
    /// A required setting is absent or blank
    pub fn missing(name: impl Into<String>) -> Self {
        let name = name.into();
        ReportError::Configuration {
            detail: format!("Missing required env var: {}", name),
            name,
        }
    }

    /// A setting is present but unusable
    pub fn invalid(name: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        let name = name.into();
        ReportError::Configuration {
            detail: format!("Invalid {}: {}", name, detail),
            name,
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ReportError::Configuration { .. })
    }

    /// Transport, status or body failure of the API call
    pub fn is_api(&self) -> bool {
        matches!(self, ReportError::Api { .. } | ReportError::NonJson { .. })
    }

    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }
}
