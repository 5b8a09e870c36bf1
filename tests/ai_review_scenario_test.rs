// tests/ai_review_scenario_test.rs
//
// Exercises the AI reviewer (C8) against a real HTTP server bound to
// loopback, so no outbound network access or live API key is required.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use scanhost::ai_review;
use scanhost::config::scan::{AiConfig, ReasoningEffort, Verbosity};
use scanhost::types::{Finding, Severity};
use serde_json::{json, Value};

fn base_config(base_url: String) -> AiConfig {
    AiConfig {
        api_key: Some("test-key".to_string()),
        base_url,
        model: "gpt-5".to_string(),
        timeout_secs: 5,
        reasoning_effort: ReasoningEffort::Medium,
        verbosity: Verbosity::Low,
        max_review_files: 10,
        max_parallel_ai_requests: 3,
        max_file_bytes: 20_000,
    }
}

fn finding(file_path: &str, severity: Severity) -> Finding {
    Finding {
        id: uuid::Uuid::new_v4().to_string(),
        scan_job_id: "job-1".to_string(),
        severity,
        tool: "semgrep".to_string(),
        file_path: file_path.to_string(),
        line_number: Some(1),
        description: "issue".to_string(),
        remediation: None,
        code_example: None,
        created_at: chrono::Utc::now(),
    }
}

async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Scenario 6: when the AI backend is unavailable on every attempt, the job
/// still completes with every finding's remediation left null, and the
/// failure count is recorded in review_stats.
#[tokio::test]
async fn review_completes_with_null_remediation_when_backend_is_unavailable() {
    async fn always_unavailable() -> axum::http::StatusCode {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }

    let app = Router::new().route("/chat/completions", post(always_unavailable));
    let addr = spawn_server(app).await;

    let config = base_config(format!("http://{addr}"));
    let workdir = tempfile::tempdir().unwrap();

    let findings = vec![
        finding("a.py", Severity::High),
        finding("b.py", Severity::Medium),
        finding("c.py", Severity::Low),
        finding("d.py", Severity::Low),
        finding("e.py", Severity::Info),
    ];

    let (reviewed, stats) = ai_review::review(&config, workdir.path(), findings).await;

    assert_eq!(reviewed.len(), 5);
    assert!(reviewed.iter().all(|f| f.remediation.is_none() && f.code_example.is_none()));
    assert!(stats.failures > 0);
    assert_eq!(stats.files_with_remediation, 0);
}

/// When the backend succeeds, remediation/code_example are merged back onto
/// the matching (file_path, line_number) finding, and the AI backend is
/// called at most once per selected file (no retries needed on success).
#[tokio::test]
async fn review_merges_successful_remediation_back_onto_findings() {
    let call_count = Arc::new(AtomicUsize::new(0));

    async fn ok_response(
        State(count): State<Arc<AtomicUsize>>,
        Json(_body): Json<Value>,
    ) -> Json<Value> {
        count.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "choices": [{
                "message": {
                    "content": serde_json::to_string(&json!({
                        "findings": [{
                            "file_path": "a.py",
                            "line_number": 1,
                            "remediation": "validate the input",
                            "code_example": "if not valid(x): raise ValueError()"
                        }]
                    })).unwrap()
                }
            }]
        }))
    }

    let app = Router::new()
        .route("/chat/completions", post(ok_response))
        .with_state(call_count.clone());
    let addr = spawn_server(app).await;

    let config = base_config(format!("http://{addr}"));
    let workdir = tempfile::tempdir().unwrap();
    std::fs::write(workdir.path().join("a.py"), b"import os\n").unwrap();

    let findings = vec![finding("a.py", Severity::High)];
    let (reviewed, stats) = ai_review::review(&config, workdir.path(), findings).await;

    assert_eq!(reviewed[0].remediation.as_deref(), Some("validate the input"));
    assert_eq!(stats.files_reviewed, 1);
    assert_eq!(stats.files_with_remediation, 1);
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}

/// Review is skipped entirely (no HTTP call at all) when there are no
/// findings to remediate.
#[tokio::test]
async fn review_skips_the_backend_when_there_are_no_findings() {
    let config = base_config("http://127.0.0.1:1".to_string());
    let workdir = tempfile::tempdir().unwrap();

    let (reviewed, stats) = ai_review::review(&config, workdir.path(), Vec::new()).await;
    assert!(reviewed.is_empty());
    assert_eq!(stats.attempts, 0);
}
