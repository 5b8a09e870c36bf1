// tests/http_api_test.rs
//
// Drives the HTTP API surface directly through the router with
// tower::ServiceExt::oneshot, against a real in-memory database.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use scanhost::api::http::create_scan_router;
use scanhost::config::scan::{AiConfig, ReasoningEffort, ScanConfig, Verbosity};
use scanhost::config::server::RateLimitConfig;
use scanhost::state::AppState;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn test_app_state(scan_limit_per_hour: u32) -> Arc<AppState> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let scan_config = ScanConfig {
        max_repo_size_mb: 500,
        clone_timeout_secs: 30,
        tool_timeout_seconds: 30,
        retention_days: 7,
        tool_fan_out: 2,
        work_root: std::env::temp_dir().display().to_string(),
        forge_token: None,
        forge_host: None,
    };
    let ai_config = AiConfig {
        api_key: None,
        base_url: "http://127.0.0.1:1".to_string(),
        model: "gpt-5".to_string(),
        timeout_secs: 5,
        reasoning_effort: ReasoningEffort::Medium,
        verbosity: Verbosity::Low,
        max_review_files: 10,
        max_parallel_ai_requests: 2,
        max_file_bytes: 20_000,
    };
    let rate_limit_config = RateLimitConfig {
        scan_limit_per_hour: scan_limit_per_hour.max(1),
    };

    Arc::new(AppState::new(
        pool,
        scan_config,
        ai_config,
        &rate_limit_config,
        CancellationToken::new(),
    ))
}

/// `create_scan` reads the caller's IP from `ConnectInfo`, which in
/// production comes from `into_make_service_with_connect_info`; tests
/// inject it the same way axum's own test helpers do, via extensions.
fn request_with_peer(method: &str, uri: &str, body: Body, peer: IpAddr) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(peer, 12345)));
    req
}

/// P1 + P2: a well-formed repo_url is accepted and round-trips through
/// GET /api/scan/{id} with the same id and repo_url.
#[tokio::test]
async fn create_then_fetch_scan_round_trips() {
    let state = test_app_state(30).await;
    let app = create_scan_router().with_state(state);

    let peer: IpAddr = "203.0.113.1".parse().unwrap();
    let body = Body::from(serde_json::to_vec(&json!({"repo_url": "https://forge.example/alice/repo"})).unwrap());

    let response = app
        .clone()
        .oneshot(request_with_peer("POST", "/scan", body, peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let created: Value = serde_json::from_slice(&bytes).unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["repo_url"], "https://forge.example/alice/repo.git");

    let response = app
        .clone()
        .oneshot(request_with_peer("GET", &format!("/scan/{id}"), Body::empty(), peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let fetched: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["repo_url"], "https://forge.example/alice/repo.git");
}

/// P1: a malformed repo_url is rejected with 400 before a job is ever
/// created.
#[tokio::test]
async fn create_scan_rejects_an_invalid_repo_url() {
    let state = test_app_state(30).await;
    let app = create_scan_router().with_state(state);

    let peer: IpAddr = "203.0.113.2".parse().unwrap();
    let body = Body::from(serde_json::to_vec(&json!({"repo_url": "not-a-url"})).unwrap());

    let response = app
        .oneshot(request_with_peer("POST", "/scan", body, peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// GET of an unknown id returns 404 rather than a bare error.
#[tokio::test]
async fn get_scan_returns_not_found_for_an_unknown_id() {
    let state = test_app_state(30).await;
    let app = create_scan_router().with_state(state);
    let peer: IpAddr = "203.0.113.3".parse().unwrap();

    let response = app
        .oneshot(request_with_peer("GET", "/scan/does-not-exist", Body::empty(), peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// P12: the (N+1)th request from one IP within the window is rejected with
/// 429 and a positive Retry-After; a different IP is unaffected.
#[tokio::test]
async fn rate_limit_rejects_the_request_past_the_per_ip_quota() {
    let state = test_app_state(2).await;
    let app = create_scan_router().with_state(state);

    let ip: IpAddr = "198.51.100.1".parse().unwrap();
    let other_ip: IpAddr = "198.51.100.2".parse().unwrap();

    let make_body = || {
        Body::from(serde_json::to_vec(&json!({"repo_url": "https://forge.example/alice/repo"})).unwrap())
    };

    let first = app.clone().oneshot(request_with_peer("POST", "/scan", make_body(), ip)).await.unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = app.clone().oneshot(request_with_peer("POST", "/scan", make_body(), ip)).await.unwrap();
    assert_eq!(second.status(), StatusCode::ACCEPTED);

    let third = app.clone().oneshot(request_with_peer("POST", "/scan", make_body(), ip)).await.unwrap();
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after = third
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .expect("Retry-After header should be a positive integer");
    assert!(retry_after > 0);

    let from_other_ip = app
        .clone()
        .oneshot(request_with_peer("POST", "/scan", make_body(), other_ip))
        .await
        .unwrap();
    assert_eq!(from_other_ip.status(), StatusCode::ACCEPTED);
}

/// GET /api/scan/config reflects whether private-repo and AI-review
/// support are configured.
#[tokio::test]
async fn scan_config_reports_unconfigured_features_as_disabled() {
    let state = test_app_state(30).await;
    let app = create_scan_router().with_state(state);
    let peer: IpAddr = "203.0.113.4".parse().unwrap();

    let response = app
        .oneshot(request_with_peer("GET", "/scan/config", Body::empty(), peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let config: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(config["private_repo_enabled"], false);
    assert_eq!(config["ai_review_enabled"], false);
}
