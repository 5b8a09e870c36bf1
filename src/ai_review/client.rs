// src/ai_review/client.rs
// Low-level HTTP client for the AI backend, reusing this codebase's
// `Gpt5Provider` shape: an OpenAI-compatible `chat/completions` JSON body
// carrying `reasoning_effort`, with explicit status-code handling for
// auth/rate-limit failures.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::config::scan::AiConfig;

#[derive(Error, Debug)]
pub enum AiClientError {
    #[error("ai backend rejected credentials")]
    Unauthorized,
    #[error("ai backend forbade the request")]
    Forbidden,
    #[error("ai backend rate limited the request")]
    RateLimited,
    #[error("ai backend request failed: {0}")]
    Request(String),
    #[error("ai backend returned malformed content: {0}")]
    Malformed(String),
}

pub type AiClientResult<T> = Result<T, AiClientError>;

#[derive(Debug, Clone, Deserialize)]
pub struct RemediationItem {
    pub file_path: String,
    pub line_number: Option<u32>,
    pub remediation: Option<String>,
    pub code_example: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemediationResponse {
    pub findings: Vec<RemediationItem>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

pub struct AiClient {
    http: Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client configuration is valid");
        Self { http, config }
    }

    /// Requests remediation for one file's findings. `prompt` already
    /// contains the file content (caller truncates to the byte budget) and
    /// the list of findings to remediate.
    pub async fn request_remediation(&self, prompt: &str) -> AiClientResult<RemediationResponse> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AiClientError::Request("ai backend not configured".to_string()))?;

        let body = json!({
            "model": self.config.model,
            "temperature": 0.1,
            "reasoning_effort": self.config.reasoning_effort.as_str(),
            "verbosity": self.config.verbosity.as_str(),
            "response_format": {"type": "json_object"},
            "messages": [
                ChatMessage {
                    role: "system",
                    content: "You are a security remediation assistant. Respond with a JSON object of the form {\"findings\": [{\"file_path\", \"line_number\", \"remediation\", \"code_example\"}]}.".to_string(),
                },
                ChatMessage { role: "user", content: prompt.to_string() },
            ],
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiClientError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED => AiClientError::Unauthorized,
                StatusCode::FORBIDDEN => AiClientError::Forbidden,
                StatusCode::TOO_MANY_REQUESTS => AiClientError::RateLimited,
                other => AiClientError::Request(format!("unexpected status {other}")),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AiClientError::Malformed(e.to_string()))?;

        let content = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| AiClientError::Malformed("missing choices[0].message.content".to_string()))?;

        serde_json::from_str::<RemediationResponse>(content).map_err(|e| {
            warn!(error = %e, "ai backend returned unparsable remediation payload");
            AiClientError::Malformed(e.to_string())
        })
    }
}
