//! Locate and clean the generated text inside a response of unknown shape.
//!
//! Providers disagree on where the answer lives, so extraction tries the
//! caller's preferred dotted paths first and then a fixed list of common
//! shapes. Whatever resolves is flattened to plain text and, optionally,
//! scrubbed of reasoning artifacts.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::error::ReportError;

/// Fallback paths appended after the caller's preferred paths
pub const FALLBACK_PATHS: &[&str] = &[
    "choices.0.message.final",
    "choices.0.message.answer",
    "choices.0.message.content",
    "choices.0.text",
    "response.output_text",
    "output_text",
    "data.text",
    "text",
];

/// Mapping fields that hold the answer, most preferred first
const ANSWER_FIELDS: &[&str] = &["final", "answer", "output_text", "text", "content"];

/// Content chunk types treated as reasoning
const REASONING_TYPES: &[&str] = &["reasoning", "thought", "thinking"];

/// Failure to follow one dotted path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("missing key '{segment}'")]
    MissingKey { segment: String },

    #[error("index '{segment}' is not valid for a list of length {len}")]
    BadIndex { segment: String, len: usize },

    #[error("cannot navigate part '{segment}' on {kind}")]
    NotContainer { segment: String, kind: &'static str },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// List position for a segment; negative values count from the end
fn resolve_index(segment: &str, len: usize) -> Option<usize> {
    let idx: i64 = segment.parse().ok()?;
    if idx < 0 {
        len.checked_sub(usize::try_from(idx.unsigned_abs()).ok()?)
    } else {
        usize::try_from(idx).ok()
    }
}

/// Follow a dotted path. Segments index lists or key mappings; an empty path
/// is the whole document.
pub fn navigate<'a>(value: &'a Value, path: &str) -> Result<&'a Value, NavigationError> {
    if path.is_empty() {
        return Ok(value);
    }

    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Array(items) => resolve_index(segment, items.len())
                .and_then(|idx| items.get(idx))
                .ok_or_else(|| NavigationError::BadIndex {
                    segment: segment.to_string(),
                    len: items.len(),
                })?,
            Value::Object(map) => map.get(segment).ok_or_else(|| NavigationError::MissingKey {
                segment: segment.to_string(),
            })?,
            other => {
                return Err(NavigationError::NotContainer {
                    segment: segment.to_string(),
                    kind: kind_of(other),
                })
            }
        };
    }

    Ok(current)
}

/// Preferred paths followed by [`FALLBACK_PATHS`], blanks dropped,
/// duplicates removed keeping the first occurrence.
pub fn candidate_paths<S: AsRef<str>>(preferred: &[S]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let all = preferred
        .iter()
        .map(|p| p.as_ref().trim())
        .chain(FALLBACK_PATHS.iter().copied());
    for path in all {
        if !path.is_empty() && !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a resolved value into plain text
pub fn normalize_to_text(value: &Value, strip_reasoning: bool) -> String {
    match value {
        Value::Object(map) => {
            for field in ANSWER_FIELDS {
                if let Some(inner) = map.get(*field).filter(|v| !is_empty_value(v)) {
                    return normalize_to_text(inner, strip_reasoning);
                }
            }
            if let Some(message) = map.get("message").filter(|v| !is_empty_value(v)) {
                return normalize_to_text(message, strip_reasoning);
            }
            value.to_string()
        }
        Value::Array(items) => {
            let mut chunks: Vec<String> = Vec::new();
            for item in items {
                let chunk = match item {
                    Value::Object(map) => {
                        let item_type = map
                            .get("type")
                            .map(scalar_text)
                            .unwrap_or_default()
                            .to_lowercase();
                        if strip_reasoning && REASONING_TYPES.contains(&item_type.as_str()) {
                            continue;
                        }
                        if item_type == "text" {
                            map.get("text").map(scalar_text).unwrap_or_default()
                        } else if let Some(text) = map.get("text") {
                            scalar_text(text)
                        } else if let Some(content) = map.get("content") {
                            scalar_text(content)
                        } else {
                            continue;
                        }
                    }
                    other => scalar_text(other),
                };
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
            }
            chunks.join("\n").trim().to_string()
        }
        other => scalar_text(other).trim().to_string(),
    }
}

struct ReasoningPatterns {
    blocks: Vec<Regex>,
    prefixed_lines: Regex,
    blank_runs: Regex,
}

fn reasoning_patterns() -> &'static ReasoningPatterns {
    static PATTERNS: OnceLock<ReasoningPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ReasoningPatterns {
        blocks: [
            r"(?is)<think>.*?</think>",
            r"(?is)<thinking>.*?</thinking>",
            r"(?is)<reasoning>.*?</reasoning>",
            r"(?is)```(?:think|thinking|reasoning)\b.*?```",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect(),
        prefixed_lines: Regex::new(r"(?im)^[ \t]*(?:reasoning|thought|thinking)[ \t]*:.*$")
            .expect("static regex"),
        blank_runs: Regex::new(r"\n{3,}").expect("static regex"),
    })
}

/// Remove inline reasoning wrappers, then collapse blank-line runs and trim.
pub fn strip_reasoning(text: &str) -> String {
    let patterns = reasoning_patterns();
    let mut out = text.replace("\r\n", "\n");
    for block in &patterns.blocks {
        out = block.replace_all(&out, "").into_owned();
    }
    out = patterns.prefixed_lines.replace_all(&out, "").into_owned();
    patterns
        .blank_runs
        .replace_all(&out, "\n\n")
        .trim()
        .to_string()
}

/// Configured extractor
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    paths: Vec<String>,
    strip_reasoning: bool,
}

impl ResponseExtractor {
    pub fn new<S: AsRef<str>>(preferred_paths: &[S], strip_reasoning: bool) -> Self {
        Self {
            paths: candidate_paths(preferred_paths),
            strip_reasoning,
        }
    }

    /// Every path that will be tried, in order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Extract, flatten and clean the generated text.
    pub fn extract(&self, response: &Value) -> Result<String, ReportError> {
        let mut last_error: Option<NavigationError> = None;
        let mut resolved = None;
        for path in &self.paths {
            match navigate(response, path) {
                Ok(value) => {
                    tracing::debug!(%path, "Resolved response path");
                    resolved = Some(value);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }

        let value = resolved.ok_or_else(|| ReportError::Extraction {
            attempted: self.paths.clone(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no response paths configured".to_string()),
        })?;

        let mut text = normalize_to_text(value, self.strip_reasoning);
        if self.strip_reasoning {
            text = strip_reasoning(&text);
        }

        if text.is_empty() {
            return Err(ReportError::EmptyResponse);
        }
        Ok(text)
    }
}
