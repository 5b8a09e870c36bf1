// src/error.rs
// Top-level error taxonomy for the scanning pipeline.
//
// Mirrors the two-tier pattern used throughout this codebase: a domain error
// enum carries full context for logs, and callers that need a user-safe
// projection render only the variant's public message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid repository url: {0}")]
    Validation(String),

    #[error("repository is private or inaccessible: {0}")]
    Access(String),

    #[error("repository exceeds the configured size limit: {0}")]
    Capacity(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn access(msg: impl Into<String>) -> Self {
        Self::Access(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The single user-safe sentence stored on `ScanJob.error` and returned
    /// from the job-status endpoint. Never includes internal causes.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::Validation(m) => format!("invalid repository url: {m}"),
            ScanError::Access(m) => format!("private repository, guidance: {m}"),
            ScanError::Capacity(m) => format!("repository too large: {m}"),
            ScanError::Timeout(m) => format!("scan timed out: {m}"),
            ScanError::Internal(_) => "internal error, scan could not complete".to_string(),
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Converts a fallible result's error into a `ScanError::Internal`, tagging
/// it with context. Mirrors this codebase's `IntoGitErrorResult` pattern.
pub trait IntoScanErrorResult<T> {
    fn into_scan_error(self, context: &str) -> ScanResult<T>;
}

impl<T, E: std::fmt::Display> IntoScanErrorResult<T> for Result<T, E> {
    fn into_scan_error(self, context: &str) -> ScanResult<T> {
        self.map_err(|e| ScanError::Internal(format!("{context}: {e}")))
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(e: tokio::task::JoinError) -> Self {
        ScanError::Internal(format!("task join failed: {e}"))
    }
}

impl From<sqlx::Error> for ScanError {
    fn from(e: sqlx::Error) -> Self {
        ScanError::Internal(format!("store error: {e}"))
    }
}
