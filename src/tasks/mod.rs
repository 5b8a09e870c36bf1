// src/tasks/mod.rs

//! Background task management for periodic maintenance work.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info};

use crate::metrics as app_metrics;
use crate::state::AppState;

pub mod config;
pub mod metrics;

use config::TaskConfig;
use metrics::TaskMetrics;

/// Manages background maintenance tasks.
pub struct TaskManager {
    app_state: Arc<AppState>,
    config: TaskConfig,
    metrics: Arc<TaskMetrics>,
    handles: Vec<JoinHandle<()>>,
}

impl TaskManager {
    pub fn new(app_state: Arc<AppState>) -> Self {
        Self {
            app_state,
            config: TaskConfig::from_env(),
            metrics: Arc::new(TaskMetrics::new()),
            handles: Vec::new(),
        }
    }

    pub async fn start(&mut self) {
        info!("starting background task manager");

        let handle = self.spawn_retention_sweeper();
        self.handles.push(handle);

        let handle = self.spawn_metrics_reporter();
        self.handles.push(handle);

        info!(count = self.handles.len(), "started background tasks");
    }

    /// C14: deletes scan jobs (and their cascaded findings) past their
    /// retention deadline.
    fn spawn_retention_sweeper(&self) -> JoinHandle<()> {
        let store = self.app_state.store.clone();
        let interval = self.config.retention_sweep_interval;
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            info!(?interval, "retention sweeper started");

            let mut interval_timer = time::interval(interval);
            interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                interval_timer.tick().await;

                let start = std::time::Instant::now();
                match store.delete_expired(chrono::Utc::now()).await {
                    Ok(deleted) => {
                        metrics.record_task_duration("retention_sweep", start.elapsed());
                        metrics.add_processed_items("retention_sweep", deleted as usize);
                        app_metrics::record_retention_sweep(deleted);
                    }
                    Err(e) => {
                        error!(error = %e, "retention sweep failed");
                        metrics.record_error("retention_sweep");
                    }
                }
            }
        })
    }

    fn spawn_metrics_reporter(&self) -> JoinHandle<()> {
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let mut interval = time::interval(std::time::Duration::from_secs(300));
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                metrics.report();
            }
        })
    }

    pub async fn shutdown(self) {
        info!("shutting down background tasks");

        for handle in self.handles {
            handle.abort();
        }

        info!("all background tasks stopped");
    }
}
