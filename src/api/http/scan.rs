// src/api/http/scan.rs
// HTTP surface for the scanning pipeline: POST /api/scan, GET /api/scan/{id},
// GET /api/scan/config.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::error::ApiError;
use crate::metrics as app_metrics;
use crate::orchestrator::{new_job, Orchestrator};
use crate::state::AppState;
use crate::types::{Finding, ScanJob};
use crate::url_validator;

/// A repo_url body is never more than a few hundred bytes; bound it well
/// clear of that to reject garbage early.
const CREATE_SCAN_MAX_BODY_BYTES: usize = 4 * 1024;

pub fn create_scan_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/scan",
            post(create_scan).layer(DefaultBodyLimit::max(CREATE_SCAN_MAX_BODY_BYTES)),
        )
        .route("/scan/{id}", get(get_scan))
        .route("/scan/config", get(get_scan_config))
}

#[derive(Deserialize)]
struct CreateScanRequest {
    repo_url: String,
}

#[derive(Serialize)]
struct CreateScanResponse {
    id: String,
    status: &'static str,
    repo_url: String,
}

async fn create_scan(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CreateScanRequest>,
) -> Result<(StatusCode, Json<CreateScanResponse>), ApiError> {
    let client_ip: IpAddr = addr.ip();
    let admission = state.rate_limiter.check(client_ip);
    if !admission.allowed {
        app_metrics::record_rate_limit_rejection();
        return Err(ApiError::RateLimited {
            retry_after_secs: admission.retry_after_secs,
        });
    }

    let validated = url_validator::validate(&req.repo_url)?;

    let job = new_job(validated.canonical_url.clone(), state.scan_config.retention_days);
    state.store.create_job(&job).await?;

    app_metrics::job_started();
    let store = state.store.clone();
    let scan_config = state.scan_config.clone();
    let ai_config = state.ai_config.clone();
    let cancel = state.cancel.clone();
    let job_id = job.id.clone();

    tokio::spawn(async move {
        let orchestrator = Orchestrator::new(store, scan_config, ai_config, cancel);
        orchestrator.run_job(job_id, validated).await;
        app_metrics::job_finished();
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateScanResponse {
            id: job.id,
            status: "pending",
            repo_url: job.repo_url,
        }),
    ))
}

#[derive(Serialize)]
struct FindingView {
    id: String,
    severity: String,
    tool: String,
    file_path: String,
    line_number: Option<u32>,
    description: String,
    remediation: Option<String>,
    code_example: Option<String>,
}

impl From<&Finding> for FindingView {
    fn from(f: &Finding) -> Self {
        Self {
            id: f.id.clone(),
            severity: f.severity.as_str().to_string(),
            tool: f.tool.clone(),
            file_path: f.file_path.clone(),
            line_number: f.line_number,
            description: f.description.clone(),
            remediation: f.remediation.clone(),
            code_example: f.code_example.clone(),
        }
    }
}

#[derive(Serialize)]
struct ScanJobView {
    id: String,
    status: &'static str,
    repo_url: String,
    languages: Vec<String>,
    findings: Vec<FindingView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    review_stats: Option<crate::types::ReviewStats>,
}

fn to_view(job: ScanJob, findings: Vec<Finding>) -> ScanJobView {
    ScanJobView {
        id: job.id,
        status: job.status.as_str(),
        repo_url: job.repo_url,
        languages: job.languages.iter().map(|l| l.as_str().to_string()).collect(),
        findings: findings.iter().map(FindingView::from).collect(),
        error: job.error,
        created_at: job.created_at,
        completed_at: job.completed_at,
        review_stats: job.review_stats,
    }
}

async fn get_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScanJobView>, ApiError> {
    let job = state
        .store
        .get_job(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("unknown or expired scan: {id}")))?;

    let findings = state.store.get_findings(&id).await.unwrap_or_else(|e| {
        warn!(job_id = %id, error = %e, "failed to load findings");
        Vec::new()
    });

    Ok(Json(to_view(job, findings)))
}

#[derive(Serialize)]
struct ScanConfigView {
    private_repo_enabled: bool,
    ai_review_enabled: bool,
    max_files_to_review: usize,
}

async fn get_scan_config(State(state): State<Arc<AppState>>) -> Json<ScanConfigView> {
    Json(ScanConfigView {
        private_repo_enabled: state.scan_config.forge_token.is_some(),
        ai_review_enabled: state.ai_config.is_configured(),
        max_files_to_review: state.ai_config.max_review_files,
    })
}
