// src/tasks/config.rs
// Configuration for background tasks.

use std::time::Duration;

pub struct TaskConfig {
    /// Retention sweep cadence (C14): deletes expired scan jobs and their
    /// cascaded findings.
    pub retention_sweep_interval: Duration,
}

impl TaskConfig {
    pub fn from_env() -> Self {
        Self {
            retention_sweep_interval: Duration::from_secs(
                std::env::var("RETENTION_SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            ),
        }
    }
}
