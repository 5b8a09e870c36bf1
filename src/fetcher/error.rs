// src/fetcher/error.rs
// Error taxonomy for the fetcher (C2), following this codebase's
// `GitError`/`IntoGitError` two-tier pattern.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("authentication required: {0}")]
    Auth(String),

    #[error("working copy exceeds size cap: {0}")]
    TooLarge(String),

    #[error("clone timed out after {0:?}")]
    CloneTimeout(std::time::Duration),

    #[error("clone failed: {0}")]
    CloneFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FetchResult<T> = Result<T, FetchError>;

pub trait IntoFetchErrorResult<T> {
    fn into_fetch_error(self, context: &str) -> FetchResult<T>;
}

impl<T, E: std::fmt::Display> IntoFetchErrorResult<T> for Result<T, E> {
    fn into_fetch_error(self, context: &str) -> FetchResult<T> {
        self.map_err(|e| FetchError::CloneFailed(format!("{context}: {e}")))
    }
}

impl From<FetchError> for crate::error::ScanError {
    fn from(e: FetchError) -> Self {
        use crate::error::ScanError;
        match e {
            FetchError::NotFound(m) | FetchError::Auth(m) => {
                ScanError::access(format!("{m} (repository may be private; configure a forge credential)"))
            }
            FetchError::TooLarge(m) => ScanError::capacity(m),
            FetchError::CloneTimeout(d) => ScanError::timeout(format!("clone exceeded {d:?}")),
            FetchError::CloneFailed(m) => ScanError::internal(m),
            FetchError::Io(e) => ScanError::internal(format!("io error: {e}")),
        }
    }
}
