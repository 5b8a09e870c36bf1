// src/main.rs
// Repository security scanning orchestrator: HTTP entrypoint.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use scanhost::api::http::{create_scan_router, health_check, liveness_check, readiness_check};
use scanhost::config::CONFIG;
use scanhost::metrics;
use scanhost::state::AppState;
use scanhost::tasks::TaskManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&CONFIG.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting scanhost");

    metrics::init_metrics();

    let connect_options = SqliteConnectOptions::from_str(&CONFIG.database.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.database.max_connections)
        .connect_with(connect_options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");

    tokio::fs::create_dir_all(&CONFIG.scan.work_root).await.ok();

    let cancel = CancellationToken::new();

    let state = Arc::new(AppState::new(
        pool,
        CONFIG.scan.clone(),
        CONFIG.ai.clone(),
        &CONFIG.rate_limit,
        cancel.clone(),
    ));

    let mut tasks = TaskManager::new(state.clone());
    tasks.start().await;

    let app = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/ready", axum::routing::get(readiness_check))
        .route("/live", axum::routing::get(liveness_check))
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .nest("/api", create_scan_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state);

    let addr = CONFIG.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel))
    .await?;

    tasks.shutdown().await;
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("shutdown signal received");
    cancel.cancel();
}
