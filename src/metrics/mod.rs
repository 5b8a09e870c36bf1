// src/metrics/mod.rs
// Prometheus metrics for the scan orchestrator.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static ACTIVE_JOBS: AtomicU64 = AtomicU64::new(0);

pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    PROMETHEUS_HANDLE
        .set(handle)
        .expect("Prometheus handle already initialized");

    info!("Prometheus metrics initialized");
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics not initialized".to_string(),
        ),
    }
}

pub fn record_request(route: &str) {
    counter!("scanhost_http_requests_total", "route" => route.to_string()).increment(1);
}

pub fn record_request_duration(route: &str, duration_seconds: f64) {
    histogram!("scanhost_http_request_duration_seconds", "route" => route.to_string())
        .record(duration_seconds);
}

pub fn record_job_outcome(status: &str) {
    counter!("scanhost_jobs_total", "status" => status.to_string()).increment(1);
}

pub fn record_tool_execution(tool: &str, success: bool, duration_seconds: f64) {
    let status = if success { "success" } else { "error" };
    counter!("scanhost_tool_executions_total", "tool" => tool.to_string(), "status" => status)
        .increment(1);
    histogram!("scanhost_tool_execution_duration_seconds", "tool" => tool.to_string())
        .record(duration_seconds);
}

pub fn record_rate_limit_rejection() {
    counter!("scanhost_rate_limit_rejections_total").increment(1);
}

pub fn record_retention_sweep(deleted: u64) {
    gauge!("scanhost_retention_sweep_last_deleted").set(deleted as f64);
}

pub fn job_started() {
    let count = ACTIVE_JOBS.fetch_add(1, Ordering::SeqCst) + 1;
    gauge!("scanhost_active_jobs").set(count as f64);
}

pub fn job_finished() {
    let count = ACTIVE_JOBS.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
    gauge!("scanhost_active_jobs").set(count as f64);
}

/// Times an HTTP handler, recording request count and duration on drop.
pub struct RequestTimer {
    start: Instant,
    route: String,
}

impl RequestTimer {
    pub fn new(route: &str) -> Self {
        record_request(route);
        Self {
            start: Instant::now(),
            route: route.to_string(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_request_duration(&self.route, duration);
    }
}
