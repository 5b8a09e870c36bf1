// src/config/mod.rs
// Central configuration, composed of per-concern sub-configs.

pub mod helpers;
pub mod scan;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: ScanHostConfig = ScanHostConfig::from_env();
}

/// Main configuration structure. Composed once at startup and held behind
/// a `lazy_static` so every component reads the same snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanHostConfig {
    pub server: server::ServerConfig,
    pub database: server::DatabaseConfig,
    pub logging: server::LoggingConfig,
    pub rate_limit: server::RateLimitConfig,
    pub scan: scan::ScanConfig,
    pub ai: scan::AiConfig,
}

impl ScanHostConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: server::ServerConfig::from_env(),
            database: server::DatabaseConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
            rate_limit: server::RateLimitConfig::from_env(),
            scan: scan::ScanConfig::from_env(),
            ai: scan::AiConfig::from_env(),
        }
    }

    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }
}

impl Default for ScanHostConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
