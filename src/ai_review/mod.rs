// src/ai_review/mod.rs
// C8: AI Reviewer. For the highest-severity flagged files, requests
// remediation from the AI backend under a cost-bounded budget.

pub mod client;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::scan::AiConfig;
use crate::types::{Finding, ReviewStats, Severity};
use client::{AiClient, AiClientError};

/// Reviews `findings` in place, attaching `remediation`/`code_example`
/// where the AI backend succeeds. Skips entirely (with a log line) when
/// findings is empty or the backend is unconfigured — this is not a
/// failure, and the job still succeeds.
pub async fn review(
    config: &AiConfig,
    workdir: &Path,
    mut findings: Vec<Finding>,
) -> (Vec<Finding>, ReviewStats) {
    if findings.is_empty() {
        info!("skipping AI review: no findings");
        return (findings, ReviewStats::default());
    }
    if !config.is_configured() {
        info!("skipping AI review: backend not configured");
        return (findings, ReviewStats::default());
    }

    let selected_files = select_files(&findings, config.max_review_files);
    let mut stats = ReviewStats {
        files_considered: count_distinct_files(&findings),
        files_reviewed: 0,
        files_with_remediation: 0,
        attempts: 0,
        failures: 0,
        total_tokens: None,
    };

    if selected_files.is_empty() {
        return (findings, stats);
    }

    let client = Arc::new(AiClient::new(config.clone()));
    let semaphore = Arc::new(Semaphore::new(config.max_parallel_ai_requests.max(1)));
    let max_file_bytes = config.max_file_bytes;

    let mut tasks = Vec::with_capacity(selected_files.len());
    for file_path in selected_files {
        let file_findings: Vec<Finding> = findings
            .iter()
            .filter(|f| f.file_path == file_path)
            .cloned()
            .collect();

        let client = client.clone();
        let semaphore = semaphore.clone();
        let file_content = read_truncated(workdir, &file_path, max_file_bytes);

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            let prompt = build_prompt(&file_path, &file_content, &file_findings);
            let outcome = request_with_retries(&client, &prompt).await;
            (file_path, outcome)
        }));
    }

    let mut remediations: HashMap<(String, Option<u32>), client::RemediationItem> = HashMap::new();

    for task in tasks {
        match task.await {
            Ok((file_path, Ok((response, attempts)))) => {
                stats.attempts += attempts;
                stats.files_reviewed += 1;
                for item in response.findings {
                    if item.remediation.is_some() && item.code_example.is_some() {
                        stats.files_with_remediation += 1;
                    }
                    remediations.insert((item.file_path.clone(), item.line_number), item);
                }
                let _ = file_path;
            }
            Ok((file_path, Err((_err, attempts)))) => {
                warn!(file = %file_path, "ai review failed after {attempts} attempts");
                stats.attempts += attempts;
                stats.failures += 1;
            }
            Err(join_err) => {
                warn!(error = %join_err, "ai review task panicked");
                stats.failures += 1;
            }
        }
    }

    for finding in findings.iter_mut() {
        if let Some(item) = remediations.get(&(finding.file_path.clone(), finding.line_number)) {
            // remediation and code_example are attached as a pair or not at all.
            if item.remediation.is_some() && item.code_example.is_some() {
                finding.remediation = item.remediation.clone();
                finding.code_example = item.code_example.clone();
            }
        }
    }

    (findings, stats)
}

/// Budget: at most `max_review_files` distinct files, selected by
/// maximum-severity finding per file descending, ties by earliest
/// `file_path`.
fn select_files(findings: &[Finding], max_review_files: usize) -> Vec<String> {
    let mut best_per_file: HashMap<String, Severity> = HashMap::new();
    for f in findings {
        best_per_file
            .entry(f.file_path.clone())
            .and_modify(|s| *s = (*s).max(f.severity))
            .or_insert(f.severity);
    }

    let mut files: Vec<(String, Severity)> = best_per_file.into_iter().collect();
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    files.into_iter().take(max_review_files).map(|(f, _)| f).collect()
}

fn count_distinct_files(findings: &[Finding]) -> usize {
    findings
        .iter()
        .map(|f| f.file_path.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len()
}

fn read_truncated(workdir: &Path, file_path: &str, max_bytes: usize) -> String {
    let full = workdir.join(file_path);
    match std::fs::read_to_string(&full) {
        Ok(content) => content.chars().take(max_bytes).collect(),
        Err(_) => String::new(),
    }
}

fn build_prompt(file_path: &str, content: &str, findings: &[Finding]) -> String {
    let findings_json: Vec<_> = findings
        .iter()
        .map(|f| {
            serde_json::json!({
                "severity": f.severity.as_str(),
                "line_number": f.line_number,
                "description": f.description,
            })
        })
        .collect();

    format!(
        "file_path: {file_path}\nfindings: {}\n\nfile content:\n{content}",
        serde_json::to_string(&findings_json).unwrap_or_default()
    )
}

/// Rate-limit responses are retried with exponential backoff up to 3
/// attempts; a single validation failure (malformed JSON) gets one retry.
async fn request_with_retries(
    client: &AiClient,
    prompt: &str,
) -> Result<(client::RemediationResponse, usize), (AiClientError, usize)> {
    let mut attempts = 0usize;
    let mut malformed_retried = false;

    loop {
        attempts += 1;
        match client.request_remediation(prompt).await {
            Ok(response) => return Ok((response, attempts)),
            Err(AiClientError::RateLimited) if attempts < 3 => {
                let backoff = Duration::from_millis(200 * 2u64.pow(attempts as u32 - 1));
                tokio::time::sleep(backoff).await;
                continue;
            }
            Err(AiClientError::Malformed(_)) if !malformed_retried => {
                malformed_retried = true;
                continue;
            }
            Err(e) => return Err((e, attempts)),
        }
    }
}
