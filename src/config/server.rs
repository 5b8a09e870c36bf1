// src/config/server.rs
// Server, database, logging, and rate-limit configuration.

use serde::{Deserialize, Serialize};

use super::helpers::{env_or, env_parsed_or};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("SCANHOST_HOST", "0.0.0.0"),
            port: env_parsed_or("SCANHOST_PORT", 8080u16),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_or("DATABASE_URL", "sqlite://scanhost.db"),
            max_connections: env_parsed_or("SCANHOST_SQLITE_MAX_CONNECTIONS", 10u32),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: env_or("SCANHOST_LOG_LEVEL", "info"),
        }
    }
}

/// Per-IP admission control in front of `POST /api/scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub scan_limit_per_hour: u32,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            scan_limit_per_hour: env_parsed_or("SCANHOST_SCAN_LIMIT_PER_HOUR", 30u32),
        }
    }
}
