// src/orchestrator/mod.rs
// C9: Job Orchestrator. Drives the explicit state machine, persists state on
// every transition, enforces cancellation, and guarantees the working
// directory is released on every exit path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::ai_review;
use crate::aggregate::aggregate;
use crate::classifier;
use crate::config::scan::{AiConfig, ScanConfig};
use crate::error::ScanError;
use crate::fetcher;
use crate::metrics as app_metrics;
use crate::store::ScanStore;
use crate::tools::{registry, runner};
use crate::types::{ScanJob, ScanStatus};
use crate::url_validator::ValidatedRepo;

pub struct Orchestrator {
    store: Arc<ScanStore>,
    scan_config: ScanConfig,
    ai_config: AiConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ScanStore>,
        scan_config: ScanConfig,
        ai_config: AiConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            scan_config,
            ai_config,
            cancel,
        }
    }

    /// Drives one job from `pending` to a terminal state. Never returns an
    /// `Err`: every failure path transitions the job to `failed` and
    /// persists a user-safe error, per spec §7.
    pub async fn run_job(&self, job_id: String, repo: ValidatedRepo) {
        let result = self.run_job_inner(&job_id, &repo).await;

        if let Err(e) = result {
            error!(job_id = %job_id, error = %e, "job failed");
            let _ = self
                .store
                .update_status(&job_id, ScanStatus::Failed, Some(&e.user_message()), Some(Utc::now()))
                .await;
            app_metrics::record_job_outcome("failed");
        }
    }

    async fn run_job_inner(&self, job_id: &str, repo: &ValidatedRepo) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::internal("cancelled before start"));
        }

        // pending -> cloning
        self.transition(job_id, ScanStatus::Cloning).await?;

        let fetch_outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ScanError::internal("cancelled during fetch")),
            res = fetcher::fetch(
                std::path::Path::new(&self.scan_config.work_root),
                repo,
                Duration::from_secs(self.scan_config.clone_timeout_secs),
                self.scan_config.max_repo_size_mb,
                self.scan_config.forge_token.clone(),
                self.scan_config.forge_host.clone(),
            ) => res.map_err(ScanError::from)?,
        };

        let workdir = fetch_outcome.workdir;
        // Guaranteed release on every exit path from here down: `workdir`'s
        // Drop impl removes the directory even if an early return happens.

        let languages = classifier::classify(workdir.path());
        let language_tags: Vec<_> = languages.iter().map(|l| l.tag).collect();
        self.store.update_languages(job_id, &language_tags).await?;

        // cloning -> scanning
        self.transition(job_id, ScanStatus::Scanning).await?;

        let selected = registry::select(&language_tags);
        if selected.is_empty() {
            warn!(job_id, "no analyzers selected for detected languages");
        }

        let fan_out = self.scan_config.tool_fan_out.max(1);
        let semaphore = Arc::new(Semaphore::new(fan_out));
        let deadline = Duration::from_secs(self.scan_config.tool_timeout_seconds);

        let mut handles = Vec::with_capacity(selected.len());
        for spec in selected {
            let semaphore = semaphore.clone();
            let workdir_path = workdir.path().to_path_buf();
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                runner::run(spec, &workdir_path, deadline, cancel).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => {
                    app_metrics::record_tool_execution(
                        &result.tool,
                        result.error.is_none() && !result.timed_out,
                        result.duration.as_secs_f64(),
                    );
                    results.push(result);
                }
                Err(join_err) => {
                    warn!(job_id, error = %join_err, "tool task panicked");
                }
            }
        }

        let all_failed = !results.is_empty() && results.iter().all(|r| r.error.is_some() || r.timed_out);
        if all_failed {
            return Err(ScanError::internal("all analyzers failed or timed out"));
        }

        let findings = aggregate(job_id, &results);
        self.store.save_findings(job_id, &findings).await?;

        // scanning -> reviewing
        self.transition(job_id, ScanStatus::Reviewing).await?;

        let (reviewed, stats) = ai_review::review(&self.ai_config, workdir.path(), findings).await;
        self.store.update_remediation(&reviewed).await?;
        self.store.attach_review_stats(job_id, &stats).await?;

        // reviewing -> completed
        self.store
            .update_status(job_id, ScanStatus::Completed, None, Some(Utc::now()))
            .await?;
        app_metrics::record_job_outcome("completed");

        info!(job_id, findings = reviewed.len(), "job completed");

        // `workdir` drops here, releasing the directory exactly once.
        drop(workdir);
        Ok(())
    }

    async fn transition(&self, job_id: &str, status: ScanStatus) -> Result<(), ScanError> {
        self.store.update_status(job_id, status, None, None).await?;
        info!(job_id, status = %status, "job transitioned");
        Ok(())
    }
}

/// Builds the initial persisted record for an accepted request.
pub fn new_job(repo_url: String, retention_days: i64) -> ScanJob {
    let now = Utc::now();
    ScanJob {
        id: uuid::Uuid::new_v4().to_string(),
        repo_url,
        status: ScanStatus::Pending,
        languages: Vec::new(),
        error: None,
        created_at: now,
        completed_at: None,
        expires_at: now + chrono::Duration::days(retention_days),
        review_stats: None,
    }
}
