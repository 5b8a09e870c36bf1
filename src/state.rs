// src/state.rs
// Application state shared across HTTP handlers.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::config::scan::{AiConfig, ScanConfig};
use crate::config::server::RateLimitConfig;
use crate::rate_limit::IpRateLimiter;
use crate::store::ScanStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ScanStore>,
    pub scan_config: ScanConfig,
    pub ai_config: AiConfig,
    pub rate_limiter: IpRateLimiter,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        scan_config: ScanConfig,
        ai_config: AiConfig,
        rate_limit_config: &RateLimitConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store: Arc::new(ScanStore::new(pool)),
            scan_config,
            ai_config,
            rate_limiter: IpRateLimiter::new(rate_limit_config.scan_limit_per_hour),
            cancel,
        }
    }
}
