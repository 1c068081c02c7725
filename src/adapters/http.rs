//! OpenAI-compatible chat endpoint client.
//!
//! One POST per call with a configurable body and auth header. The parsed
//! JSON body is returned as-is for extraction.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use super::Generator;
use crate::config::ApiSettings;
use crate::core::error::ReportError;
use crate::domain::PromptPair;

/// Characters of a non-JSON body kept in the error
const BODY_PREVIEW_CHARS: usize = 500;

/// HTTP generator over `reqwest`
pub struct HttpGenerator {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(settings: ApiSettings) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ReportError::Api {
                status: None,
                detail: e.to_string(),
            })?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Request body for a prompt pair
    pub fn payload(&self, prompts: &PromptPair) -> Value {
        let model = self.settings.model.as_deref().unwrap_or_default();
        match &self.settings.request_template {
            Some(template) => {
                let mapping = [
                    ("model", model),
                    ("system_prompt", prompts.system.as_str()),
                    ("user_prompt", prompts.user.as_str()),
                ];
                replace_placeholders(template, &mapping)
            }
            None => build_default_payload(self.settings.model.as_deref(), prompts),
        }
    }

    /// Request headers: content type, auth when a key is set, then extras
    pub fn headers(&self) -> Result<HeaderMap, ReportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &self.settings.api_key {
            let value = if self.settings.auth_scheme.is_empty() {
                key.clone()
            } else {
                format!("{} {}", self.settings.auth_scheme, key)
            };
            insert_header(&mut headers, "REPORT_API_AUTH_HEADER", &self.settings.auth_header, &value)?;
        }

        for (name, value) in &self.settings.extra_headers {
            insert_header(&mut headers, "REPORT_API_EXTRA_HEADERS_JSON", name, value)?;
        }
        Ok(headers)
    }

    /// Send the request and parse the body as JSON
    #[instrument(skip(self, prompts), fields(endpoint = %self.settings.endpoint))]
    pub async fn request(&self, prompts: &PromptPair) -> Result<Value, ReportError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .headers(self.headers()?)
            .json(&self.payload(prompts))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        debug!(status = status.as_u16(), bytes = raw.len(), "Response received");

        if !status.is_success() {
            return Err(ReportError::Api {
                status: Some(status.as_u16()),
                detail: raw,
            });
        }

        serde_json::from_str(&raw).map_err(|_| ReportError::NonJson {
            preview: raw.chars().take(BODY_PREVIEW_CHARS).collect(),
        })
    }

    /// Failures before a status arrives carry no status code
    fn transport_error(&self, e: reqwest::Error) -> ReportError {
        let detail = if e.is_timeout() {
            format!("request timed out after {}s", self.settings.timeout.as_secs())
        } else {
            e.to_string()
        };
        ReportError::Api {
            status: None,
            detail,
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, prompts: &PromptPair) -> Result<Value, ReportError> {
        self.request(prompts).await
    }
}

fn insert_header(
    headers: &mut HeaderMap,
    setting: &str,
    name: &str,
    value: &str,
) -> Result<(), ReportError> {
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| ReportError::invalid(setting, format!("header name {:?}: {}", name, e)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| ReportError::invalid(setting, format!("value for {}: {}", name, e)))?;
    headers.insert(name, value);
    Ok(())
}

/// Substitute `{{key}}` markers inside every string of a JSON template.
pub fn replace_placeholders(template: &Value, mapping: &[(&str, &str)]) -> Value {
    match template {
        Value::String(s) => {
            let mut out = s.clone();
            for (key, value) in mapping {
                out = out.replace(&format!("{{{{{}}}}}", key), value);
            }
            Value::String(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_placeholders(item, mapping))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace_placeholders(v, mapping)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Chat-completions body. `model` is omitted when unset.
pub fn build_default_payload(model: Option<&str>, prompts: &PromptPair) -> Value {
    let mut payload = json!({
        "messages": [
            {"role": "system", "content": prompts.system},
            {"role": "user", "content": prompts.user},
        ],
        "temperature": 0.2,
        "top_p": 0.9,
        "stream": false,
    });
    if let (Some(model), Value::Object(map)) = (model.filter(|m| !m.is_empty()), &mut payload) {
        map.insert("model".to_string(), Value::String(model.to_string()));
    }
    payload
}
