//! Active queue health checking.
//!
//! # Responsibilities
//! - Periodically check the broker connection
//! - Try a single reconnect when the connection is gone
//! - Update the shared health state based on results

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::state::{HealthState, QueueHealth};
use crate::observability::metrics;
use crate::queue::QueueClient;

pub struct HealthMonitor {
    queue: QueueClient,
    health: Arc<QueueHealth>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(queue: QueueClient, health: Arc<QueueHealth>, config: HealthCheckConfig) -> Self {
        Self {
            queue,
            health,
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.config.interval_ms,
            queue = %self.queue.address(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one check and record the outcome.
    pub async fn check(&self) -> HealthState {
        let mut connected = self.queue.is_connected().await;

        if !connected {
            match self.queue.reconnect().await {
                Ok(()) => connected = true,
                Err(e) => {
                    tracing::warn!(queue = %self.queue.address(), error = %e, "Health check failed: queue unreachable");
                }
            }
        }

        let changed = if connected {
            self.health.mark_success(self.config.healthy_threshold as usize)
        } else {
            self.health.mark_failure(self.config.unhealthy_threshold as usize)
        };

        match changed {
            Some(HealthState::Healthy) => {
                tracing::info!(queue = %self.queue.address(), "Queue marked healthy");
            }
            Some(HealthState::Unhealthy) => {
                tracing::error!(queue = %self.queue.address(), "Queue marked unhealthy");
            }
            _ => {}
        }

        metrics::record_queue_health(self.health.is_healthy());
        self.health.state()
    }
}
