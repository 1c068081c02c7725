//! Configuration resolution for daylog.
//!
//! Configuration sources (highest priority first):
//! 1. Local override store (`<root>/.env.secrets`, a flat JSON object)
//! 2. Process environment variables
//! 3. Defaults
//!
//! A blank value in any layer counts as unset and falls through to the next.
//! The resolver is an explicit value handed to each component; nothing here
//! is cached process-wide.

pub mod paths;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Weekday;
use serde_json::Value;
use tracing::warn;

use crate::core::error::ReportError;
use crate::domain::prompt::{DEFAULT_SYSTEM_PROMPT, DEFAULT_WEEKLY_SYSTEM_PROMPT};

/// Keys surfaced by `env list` even when unset, with a short description
pub const KNOWN_KEYS: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "Required for report generation"),
    ("REPORT_API_URL", "API Endpoint (default: OpenAI)"),
    ("REPORT_API_MODEL", "Model Name (e.g. gpt-4)"),
    ("REPORT_SYSTEM_PROMPT", "Custom system prompt override"),
];

/// Prefix of variables picked up from the process environment by `env list`
pub const REPORT_PREFIX: &str = "REPORT_";

/// Default response path when neither path key is set
pub const DEFAULT_RESPONSE_PATH: &str = "choices.0.message.content";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Layered key-value lookup: local override store over process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvResolver {
    store_path: Option<PathBuf>,
    overrides: BTreeMap<String, String>,
    process: HashMap<String, String>,
}

impl EnvResolver {
    /// Load the override store at `store_path` and capture the process environment.
    ///
    /// A missing store is an empty layer. An unreadable or malformed store is
    /// logged and treated as empty.
    pub fn load(store_path: impl Into<PathBuf>) -> Self {
        let store_path = store_path.into();
        let overrides = match load_store(&store_path) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %store_path.display(), error = %e, "Ignoring unreadable override store");
                BTreeMap::new()
            }
        };

        Self {
            store_path: Some(store_path),
            overrides,
            process: std::env::vars().collect(),
        }
    }

    /// Build a resolver from explicit layers (no file, no process environment)
    pub fn from_parts<O, P, K, V>(overrides: O, process: P) -> Self
    where
        O: IntoIterator<Item = (K, V)>,
        P: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            store_path: None,
            overrides: overrides
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            process: process
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Path of the override store, if file-backed
    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }

    /// First non-blank value across the layers
    pub fn get(&self, name: &str) -> Option<String> {
        self.overrides
            .get(name)
            .filter(|v| !is_blank(v))
            .or_else(|| self.process.get(name).filter(|v| !is_blank(v)))
            .cloned()
    }

    /// Value or `default`
    pub fn resolve(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Value, or a configuration error when absent or blank
    pub fn require(&self, name: &str) -> Result<String, ReportError> {
        self.get(name).ok_or_else(|| ReportError::missing(name))
    }

    /// Boolean toggle: `1/true/yes/on` are true, any other set value is false
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).map(|v| truthy(&v)).unwrap_or(default)
    }

    /// Set a key in the override store and persist the whole store.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self
            .store_path
            .clone()
            .context("Resolver has no override store to write to")?;

        self.overrides.insert(key.to_string(), value.to_string());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.overrides)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write override store: {}", path.display()))?;

        Ok(())
    }

    /// Merged view: known keys and `REPORT_*` process variables, overlaid by
    /// the local store, with every known key present.
    pub fn list(&self) -> BTreeMap<String, String> {
        let mut merged: BTreeMap<String, String> = self
            .process
            .iter()
            .filter(|(k, _)| {
                k.starts_with(REPORT_PREFIX) || KNOWN_KEYS.iter().any(|(known, _)| known == k)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        merged.extend(self.overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        for (known, _) in KNOWN_KEYS {
            merged.entry(known.to_string()).or_default();
        }

        merged
    }
}

/// Read the flat JSON override store. Non-string scalars are stringified;
/// nested values are skipped.
fn load_store(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read override store: {}", path.display()))?;
    let parsed: serde_json::Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse override store: {}", path.display()))?;

    Ok(parsed
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            Value::Number(n) => Some((k, n.to_string())),
            Value::Bool(b) => Some((k, b.to_string())),
            _ => None,
        })
        .collect())
}

// ============================================================================
// Typed settings
// ============================================================================

/// Everything the HTTP generator needs, resolved once per invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout: Duration,
    /// Preferred response paths, before the built-in fallbacks
    pub response_paths: Vec<String>,
    pub auth_header: String,
    /// Blank scheme sends the bare key
    pub auth_scheme: String,
    pub extra_headers: BTreeMap<String, String>,
    pub request_template: Option<Value>,
    pub strip_reasoning: bool,
}

impl ApiSettings {
    pub fn from_resolver(env: &EnvResolver) -> Result<Self, ReportError> {
        let endpoint = env.require("REPORT_API_URL")?;

        let timeout_raw = env.resolve("REPORT_API_TIMEOUT", &DEFAULT_TIMEOUT_SECONDS.to_string());
        let timeout_secs: u64 = timeout_raw
            .trim()
            .parse()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ReportError::invalid(
                    "REPORT_API_TIMEOUT",
                    format!("expected a positive number of seconds, got {:?}", timeout_raw),
                )
            })?;

        // REPORT_API_RESPONSE_PATHS wins; the single-path key is the legacy form
        let paths_csv = env
            .get("REPORT_API_RESPONSE_PATHS")
            .unwrap_or_else(|| env.resolve("REPORT_API_RESPONSE_PATH", DEFAULT_RESPONSE_PATH));
        let response_paths = split_paths(&paths_csv);

        let extra_headers = match env.get("REPORT_API_EXTRA_HEADERS_JSON") {
            Some(raw) => parse_headers(&raw)?,
            None => BTreeMap::new(),
        };

        let request_template = match env.get("REPORT_API_REQUEST_TEMPLATE_JSON") {
            Some(raw) => Some(
                serde_json::from_str(&raw)
                    .map_err(|e| ReportError::invalid("REPORT_API_REQUEST_TEMPLATE_JSON", e))?,
            ),
            None => None,
        };

        Ok(Self {
            endpoint,
            api_key: env.get("REPORT_API_KEY"),
            model: env.get("REPORT_API_MODEL"),
            timeout: Duration::from_secs(timeout_secs),
            response_paths,
            auth_header: env.resolve("REPORT_API_AUTH_HEADER", "Authorization"),
            // Blank falls through to the default, so "none" is the opt-out
            auth_scheme: match env.resolve("REPORT_API_AUTH_SCHEME", "Bearer").as_str() {
                s if s.eq_ignore_ascii_case("none") => String::new(),
                s => s.to_string(),
            },
            extra_headers,
            request_template,
            strip_reasoning: env.get_bool("REPORT_STRIP_THINK", true),
        })
    }
}

/// Split a comma-separated path list, dropping blanks
pub fn split_paths(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_headers(raw: &str) -> Result<BTreeMap<String, String>, ReportError> {
    const KEY: &str = "REPORT_API_EXTRA_HEADERS_JSON";
    let value: Value = serde_json::from_str(raw).map_err(|e| ReportError::invalid(KEY, e))?;
    let Value::Object(map) = value else {
        return Err(ReportError::invalid(KEY, "expected a JSON object"));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

/// System prompt for daily reports, with the override applied
pub fn daily_system_prompt(env: &EnvResolver) -> String {
    env.resolve("REPORT_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT)
}

/// Weekly report scheduling and prompt settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySettings {
    pub enforce_schedule: bool,
    /// `None` when the configured day could not be parsed
    pub weekday: Option<Weekday>,
    /// `None` (configured as `any`) disables the hour check
    pub hour_utc: Option<u32>,
    pub include_today: bool,
    pub system_prompt: String,
}

impl WeeklySettings {
    pub fn from_resolver(env: &EnvResolver) -> Result<Self, ReportError> {
        let hour_raw = env.resolve("REPORT_WEEKLY_HOUR_UTC", "9");
        let hour_utc = if matches!(hour_raw.trim(), "any" | "*") {
            None
        } else {
            let hour: u32 = hour_raw
                .trim()
                .parse()
                .ok()
                .filter(|h| *h < 24)
                .ok_or_else(|| {
                    ReportError::invalid(
                        "REPORT_WEEKLY_HOUR_UTC",
                        format!("expected an hour 0-23, got {:?}", hour_raw),
                    )
                })?;
            Some(hour)
        };

        Ok(Self {
            enforce_schedule: env.get_bool("REPORT_WEEKLY_ENFORCE_SCHEDULE", false),
            weekday: parse_weekday(&env.resolve("REPORT_WEEKLY_DAY", "mon")),
            hour_utc,
            include_today: env.get_bool("REPORT_WEEKLY_INCLUDE_TODAY", false),
            system_prompt: env.resolve("REPORT_WEEKLY_SYSTEM_PROMPT", DEFAULT_WEEKLY_SYSTEM_PROMPT),
        })
    }
}

/// Parse a weekday name, short form, or digit.
///
/// Digits `0-6` count from Monday; `7` is Sunday.
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    if let Ok(num) = value.parse::<usize>() {
        const FROM_MONDAY: [Weekday; 7] = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        return match num {
            7 => Some(Weekday::Sun),
            n => FROM_MONDAY.get(n).copied(),
        };
    }
    match value.as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(overrides: &[(&str, &str)], process: &[(&str, &str)]) -> EnvResolver {
        EnvResolver::from_parts(overrides.iter().copied(), process.iter().copied())
    }

    #[test]
    fn test_override_beats_process() {
        let env = resolver(&[("PRIORITY_TEST", "local_value")], &[("PRIORITY_TEST", "system_value")]);
        assert_eq!(env.get("PRIORITY_TEST").as_deref(), Some("local_value"));
    }

    #[test]
    fn test_blank_override_falls_through() {
        let env = resolver(&[("KEY", "  ")], &[("KEY", "system_value")]);
        assert_eq!(env.get("KEY").as_deref(), Some("system_value"));

        let env = resolver(&[("KEY", "")], &[("KEY", "")]);
        assert_eq!(env.resolve("KEY", "fallback"), "fallback");
    }

    #[test]
    fn test_require_blank_is_configuration_error() {
        let env = resolver(&[], &[("REPORT_API_URL", " ")]);
        let err = env.require("REPORT_API_URL").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("REPORT_API_URL"));
    }

    #[test]
    fn test_get_bool() {
        let env = resolver(&[("A", "Yes"), ("B", "off")], &[]);
        assert!(env.get_bool("A", false));
        assert!(!env.get_bool("B", true));
        assert!(env.get_bool("C", true));
    }

    #[test]
    fn test_load_save_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".env.secrets");

        let mut env = EnvResolver::load(&path);
        env.set("TEST_KEY", "test_value").unwrap();

        let content: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(content["TEST_KEY"], "test_value");

        let reloaded = EnvResolver::load(&path);
        assert_eq!(reloaded.get("TEST_KEY").as_deref(), Some("test_value"));
    }

    #[test]
    fn test_malformed_store_is_empty_layer() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".env.secrets");
        std::fs::write(&path, "{not json").unwrap();

        let env = EnvResolver::load(&path);
        assert!(env.overrides.is_empty());
    }

    #[test]
    fn test_list_merges_layers_and_known_keys() {
        let env = resolver(
            &[("REPORT_API_MODEL", "gpt-4"), ("CUSTOM", "x")],
            &[("REPORT_API_URL", "http://api"), ("PATH", "/bin")],
        );
        let listed = env.list();
        assert_eq!(listed["REPORT_API_URL"], "http://api");
        assert_eq!(listed["REPORT_API_MODEL"], "gpt-4");
        assert_eq!(listed["CUSTOM"], "x");
        assert_eq!(listed["OPENAI_API_KEY"], "");
        assert!(!listed.contains_key("PATH"));
    }

    #[test]
    fn test_api_settings_defaults() {
        let env = resolver(&[], &[("REPORT_API_URL", "http://fake-api")]);
        let settings = ApiSettings::from_resolver(&env).unwrap();

        assert_eq!(settings.endpoint, "http://fake-api");
        assert_eq!(settings.timeout, Duration::from_secs(120));
        assert_eq!(settings.response_paths, vec![DEFAULT_RESPONSE_PATH]);
        assert_eq!(settings.auth_header, "Authorization");
        assert_eq!(settings.auth_scheme, "Bearer");
        assert!(settings.api_key.is_none());
        assert!(settings.model.is_none());
        assert!(settings.strip_reasoning);
        assert!(settings.request_template.is_none());
    }

    #[test]
    fn test_api_settings_require_endpoint() {
        let err = ApiSettings::from_resolver(&resolver(&[], &[])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_response_paths_csv_beats_legacy() {
        let env = resolver(
            &[],
            &[
                ("REPORT_API_URL", "http://x"),
                ("REPORT_API_RESPONSE_PATHS", "output.0.text, ,data.answer"),
                ("REPORT_API_RESPONSE_PATH", "legacy.path"),
            ],
        );
        let settings = ApiSettings::from_resolver(&env).unwrap();
        assert_eq!(settings.response_paths, vec!["output.0.text", "data.answer"]);

        let legacy = resolver(
            &[],
            &[("REPORT_API_URL", "http://x"), ("REPORT_API_RESPONSE_PATH", "legacy.path")],
        );
        assert_eq!(
            ApiSettings::from_resolver(&legacy).unwrap().response_paths,
            vec!["legacy.path"]
        );
    }

    #[test]
    fn test_invalid_json_settings() {
        let env = resolver(
            &[],
            &[("REPORT_API_URL", "http://x"), ("REPORT_API_EXTRA_HEADERS_JSON", "[1]")],
        );
        assert!(ApiSettings::from_resolver(&env).unwrap_err().is_configuration());

        let env = resolver(
            &[],
            &[("REPORT_API_URL", "http://x"), ("REPORT_API_REQUEST_TEMPLATE_JSON", "{oops")],
        );
        let err = ApiSettings::from_resolver(&env).unwrap_err();
        assert!(err.to_string().contains("REPORT_API_REQUEST_TEMPLATE_JSON"));

        let env = resolver(&[], &[("REPORT_API_URL", "http://x"), ("REPORT_API_TIMEOUT", "soon")]);
        assert!(ApiSettings::from_resolver(&env).unwrap_err().is_configuration());
    }

    #[test]
    fn test_extra_headers_and_scheme_opt_out() {
        let env = resolver(
            &[],
            &[
                ("REPORT_API_URL", "http://x"),
                ("REPORT_API_EXTRA_HEADERS_JSON", r#"{"X-Team": "notes", "X-Retry": 0}"#),
                ("REPORT_API_AUTH_SCHEME", "none"),
            ],
        );
        let settings = ApiSettings::from_resolver(&env).unwrap();
        assert_eq!(settings.extra_headers["X-Team"], "notes");
        assert_eq!(settings.extra_headers["X-Retry"], "0");
        assert_eq!(settings.auth_scheme, "");
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("mon"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("Thurs"), Some(Weekday::Thu));
        assert_eq!(parse_weekday("0"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("6"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("7"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("8"), None);
        assert_eq!(parse_weekday("someday"), None);
        assert_eq!(parse_weekday(""), None);
    }

    #[test]
    fn test_weekly_settings() {
        let env = resolver(&[], &[]);
        let weekly = WeeklySettings::from_resolver(&env).unwrap();
        assert!(!weekly.enforce_schedule);
        assert_eq!(weekly.weekday, Some(Weekday::Mon));
        assert_eq!(weekly.hour_utc, Some(9));
        assert_eq!(weekly.system_prompt, DEFAULT_WEEKLY_SYSTEM_PROMPT);

        let env = resolver(&[], &[("REPORT_WEEKLY_HOUR_UTC", "")]);
        assert_eq!(WeeklySettings::from_resolver(&env).unwrap().hour_utc, Some(9));

        let env = resolver(&[], &[("REPORT_WEEKLY_HOUR_UTC", "any")]);
        assert_eq!(WeeklySettings::from_resolver(&env).unwrap().hour_utc, None);

        let env = resolver(&[], &[("REPORT_WEEKLY_HOUR_UTC", "25")]);
        assert!(WeeklySettings::from_resolver(&env).is_err());
    }
}
