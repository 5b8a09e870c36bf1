// src/config/scan.rs
// Scan-pipeline tuning: fetch, runner, and retention bounds.

use serde::{Deserialize, Serialize};

use super::helpers::{env_or, env_parsed_or};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub max_repo_size_mb: u64,
    pub clone_timeout_secs: u64,
    pub tool_timeout_seconds: u64,
    pub retention_days: i64,
    pub tool_fan_out: usize,
    pub work_root: String,
    /// Optional forge credential. Never logged, never placed in argv.
    pub forge_token: Option<String>,
    pub forge_host: Option<String>,
}

impl ScanConfig {
    pub fn from_env() -> Self {
        Self {
            max_repo_size_mb: env_parsed_or("SCANHOST_MAX_REPO_SIZE_MB", 500u64),
            clone_timeout_secs: env_parsed_or("SCANHOST_CLONE_TIMEOUT", 300u64),
            tool_timeout_seconds: env_parsed_or("SCANHOST_TOOL_TIMEOUT_SECONDS", 300u64),
            retention_days: env_parsed_or("SCANHOST_RETENTION_DAYS", 7i64),
            tool_fan_out: env_parsed_or("SCANHOST_TOOL_FAN_OUT", 6usize),
            work_root: env_or("SCANHOST_WORK_ROOT", "/tmp/scanhost-work"),
            forge_token: std::env::var("SCANHOST_FORGE_TOKEN").ok(),
            forge_host: std::env::var("SCANHOST_FORGE_HOST").ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Low,
    Medium,
    High,
    Xhigh,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::None => "none",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
            ReasoningEffort::Xhigh => "xhigh",
        }
    }

    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "low" => ReasoningEffort::Low,
            "medium" => ReasoningEffort::Medium,
            "high" => ReasoningEffort::High,
            "xhigh" => ReasoningEffort::Xhigh,
            _ => ReasoningEffort::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Low => "low",
            Verbosity::Medium => "medium",
            Verbosity::High => "high",
        }
    }

    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "high" => Verbosity::High,
            "low" => Verbosity::Low,
            _ => Verbosity::Medium,
        }
    }
}

/// AI backend tuning for the remediation reviewer (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub reasoning_effort: ReasoningEffort,
    pub verbosity: Verbosity,
    pub max_review_files: usize,
    pub max_parallel_ai_requests: usize,
    pub max_file_bytes: usize,
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("SCANHOST_OPENAI_API_KEY").ok(),
            base_url: env_or("SCANHOST_OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("SCANHOST_CODE_REVIEW_MODEL", "gpt-5"),
            timeout_secs: env_parsed_or("SCANHOST_OPENAI_TIMEOUT", 60u64),
            reasoning_effort: ReasoningEffort::parse(&env_or(
                "SCANHOST_REASONING_EFFORT",
                "medium",
            )),
            verbosity: Verbosity::parse(&env_or("SCANHOST_VERBOSITY", "low")),
            max_review_files: env_parsed_or("SCANHOST_MAX_REVIEW_FILES", 10usize),
            max_parallel_ai_requests: env_parsed_or("SCANHOST_MAX_PARALLEL_AI_REQUESTS", 3usize),
            max_file_bytes: env_parsed_or("SCANHOST_AI_MAX_FILE_BYTES", 20_000usize),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
