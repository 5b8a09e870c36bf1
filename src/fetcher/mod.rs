// src/fetcher/mod.rs
// C2: acquires a read-only working copy into a private temporary directory,
// enforces the size ceiling before any analyzer runs, and scrubs credentials
// from every log record along the way.
//
// The clone itself mirrors this codebase's `GitOperations::clone_repo`:
// `git2::Repository::clone` wrapped in `tokio::task::spawn_blocking`, joined
// with a `tokio::time::timeout` for the deadline.

pub mod error;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, RemoteCallbacks};
use tracing::{info, warn};
use uuid::Uuid;

use crate::url_validator::ValidatedRepo;
use crate::utils::redact::redact_known;
use error::{FetchError, FetchResult};

/// RAII handle over the private working directory acquired for one job.
/// Guaranteed to be removed on release or drop, matching this codebase's
/// "scoped acquisition with guaranteed release on all exit paths" idiom.
pub struct WorkingDir {
    path: PathBuf,
    released: AtomicBool,
}

impl WorkingDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotent: safe to call multiple times, and safe to call on a
    /// partially populated or already-removed directory.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release working directory");
            }
        }
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct FetchOutcome {
    pub workdir: WorkingDir,
}

/// Fetch `repo` into a fresh directory under `work_root`, enforcing
/// `max_repo_size_mb` before returning. `forge_token`/`forge_host` are only
/// used when the repo's host matches the configured forge; the token is
/// handed to `git2` via its credentials callback and never touches argv,
/// environment, or log output.
pub async fn fetch(
    work_root: &Path,
    repo: &ValidatedRepo,
    clone_timeout: Duration,
    max_repo_size_mb: u64,
    forge_token: Option<String>,
    forge_host: Option<String>,
) -> FetchResult<FetchOutcome> {
    std::fs::create_dir_all(work_root)?;

    let id = Uuid::new_v4().to_string();
    let local_path = work_root.join(&id);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(&local_path)?;
        std::fs::set_permissions(&local_path, std::fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    std::fs::create_dir_all(&local_path)?;

    let workdir = WorkingDir {
        path: local_path.clone(),
        released: AtomicBool::new(false),
    };

    let url = repo.canonical_url.clone();
    let dest = local_path.clone();
    let use_credential = forge_token.clone().filter(|_| {
        forge_host
            .as_deref()
            .map(|h| h == repo.host)
            .unwrap_or(false)
    });

    let clone_task = tokio::task::spawn_blocking(move || clone_blocking(&url, &dest, use_credential));

    let join_result = tokio::time::timeout(clone_timeout, clone_task).await;

    let clone_result = match join_result {
        Ok(r) => r,
        Err(_) => {
            workdir.release();
            return Err(FetchError::CloneTimeout(clone_timeout));
        }
    };

    match clone_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            workdir.release();
            return Err(e);
        }
        Err(join_err) => {
            workdir.release();
            return Err(FetchError::CloneFailed(format!("join error: {join_err}")));
        }
    }

    let size_bytes = directory_size(&local_path).unwrap_or(0);
    let size_mb = size_bytes / (1024 * 1024);
    if size_mb > max_repo_size_mb {
        info!(repo = %repo.canonical_url, size_mb, cap = max_repo_size_mb, "working copy exceeds size cap");
        workdir.release();
        return Err(FetchError::TooLarge(format!(
            "{size_mb}MB exceeds cap of {max_repo_size_mb}MB"
        )));
    }

    info!(repo = %repo.canonical_url, size_mb, "fetched working copy");
    Ok(FetchOutcome { workdir })
}

fn clone_blocking(url: &str, dest: &Path, token: Option<String>) -> FetchResult<()> {
    let mut builder = RepoBuilder::new();

    if let Some(token) = token.clone() {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            Cred::userpass_plaintext(username_from_url.unwrap_or("x-access-token"), &token)
        });
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        builder.fetch_options(fetch_options);
    }

    match builder.clone(url, dest) {
        Ok(_repo) => Ok(()),
        Err(e) => {
            let message = redact_known(e.message(), token.as_deref().unwrap_or(""));
            let class = e.class();
            if matches!(
                class,
                git2::ErrorClass::Net | git2::ErrorClass::Http
            ) && (message.contains("404") || message.to_ascii_lowercase().contains("not found"))
            {
                Err(FetchError::NotFound(message))
            } else if matches!(class, git2::ErrorClass::Ssh | git2::ErrorClass::Http)
                && (message.to_ascii_lowercase().contains("auth")
                    || message.to_ascii_lowercase().contains("401")
                    || message.to_ascii_lowercase().contains("403"))
            {
                Err(FetchError::Auth(message))
            } else {
                Err(FetchError::CloneFailed(message))
            }
        }
    }
}

fn directory_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    for entry in walkdir::WalkDir::new(path).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() {
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directory_size_sums_file_bytes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"1234567890").unwrap();

        let size = directory_size(dir.path()).unwrap();
        assert_eq!(size, 15);
    }

    #[test]
    fn release_is_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("wd");
        std::fs::create_dir_all(&nested).unwrap();

        let wd = WorkingDir {
            path: nested.clone(),
            released: AtomicBool::new(false),
        };
        wd.release();
        wd.release();
        assert!(!nested.exists());
    }
}
