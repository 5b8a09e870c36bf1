// src/types.rs
// Core domain types shared across the scanning pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed severity ladder, ordered worst-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    // Declared worst-to-best so the derived Ord sorts ascending-bad; callers
    // that want "critical first" reverse the comparison explicitly.
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn from_str_lenient(s: &str) -> Severity {
        match s.to_ascii_lowercase().as_str() {
            "critical" | "error" | "blocker" => Severity::Critical,
            "high" | "warning" | "warn" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" | "minor" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed language enumeration. Anything unrecognized collapses to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    Go,
    Javascript,
    Typescript,
    Python,
    Java,
    Ruby,
    Php,
    C,
    Cpp,
    Rust,
    Other,
}

impl LanguageTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageTag::Go => "go",
            LanguageTag::Javascript => "javascript",
            LanguageTag::Typescript => "typescript",
            LanguageTag::Python => "python",
            LanguageTag::Java => "java",
            LanguageTag::Ruby => "ruby",
            LanguageTag::Php => "php",
            LanguageTag::C => "c",
            LanguageTag::Cpp => "cpp",
            LanguageTag::Rust => "rust",
            LanguageTag::Other => "other",
        }
    }

    pub fn from_extension(ext: &str) -> LanguageTag {
        match ext.to_ascii_lowercase().as_str() {
            "go" => LanguageTag::Go,
            "js" | "jsx" | "mjs" | "cjs" => LanguageTag::Javascript,
            "ts" | "tsx" => LanguageTag::Typescript,
            "py" | "pyi" => LanguageTag::Python,
            "java" => LanguageTag::Java,
            "rb" => LanguageTag::Ruby,
            "php" => LanguageTag::Php,
            "c" | "h" => LanguageTag::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => LanguageTag::Cpp,
            "rs" => LanguageTag::Rust,
            _ => LanguageTag::Other,
        }
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single (tag, file_count, share) entry in a classification result.
/// `share` is this tag's fraction of all classified files, in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageCount {
    pub tag: LanguageTag,
    pub file_count: usize,
    pub share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Cloning,
    Scanning,
    Reviewing,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Cloning => "cloning",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Reviewing => "reviewing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "cloning" => Ok(ScanStatus::Cloning),
            "scanning" => Ok(ScanStatus::Scanning),
            "reviewing" => Ok(ScanStatus::Reviewing),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            other => Err(format!("unknown scan status: {other}")),
        }
    }
}

/// Aggregate stats for the AI remediation pass, attached to a completed job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewStats {
    pub files_considered: usize,
    pub files_reviewed: usize,
    pub files_with_remediation: usize,
    pub attempts: usize,
    pub failures: usize,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: String,
    pub repo_url: String,
    pub status: ScanStatus,
    pub languages: Vec<LanguageTag>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub review_stats: Option<ReviewStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub scan_job_id: String,
    pub severity: Severity,
    pub tool: String,
    pub file_path: String,
    pub line_number: Option<u32>,
    pub description: String,
    pub remediation: Option<String>,
    pub code_example: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single analyzer's raw parse output, before dedup/ordering.
#[derive(Debug, Clone)]
pub struct RawFinding {
    pub file_path: String,
    pub line_number: Option<u32>,
    pub description: String,
    pub severity: Severity,
    pub rule_id: Option<String>,
}

/// In-memory only: one per analyzer invocation, never persisted directly.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool: String,
    pub raw_findings: Vec<RawFinding>,
    pub timed_out: bool,
    pub error: Option<String>,
    pub duration: std::time::Duration,
}
