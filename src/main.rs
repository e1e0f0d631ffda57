//! Bob API server.
//!
//! Starts the runtime, creates the storage and message queue clients and
//! deploys the HTTP server unit described by the OpenAPI document.
//!
//! # Architecture Overview
//!
//! ```text
//!   env / BOB_CONFIG ──▶ config ──▶ RuntimeOptions ──▶ tokio runtime
//!                                                          │
//!                                                          ▼
//!                                                   Bootstrapper
//!                                                          │ deploy
//!                                                          ▼
//!   ┌────────────────────────────── ApiServer unit ───────────────────────────┐
//!   │  StorageClient ──▶ Postgres                                             │
//!   │  api.yaml ──▶ spec        QueueClient ──▶ AMQP broker                   │
//!   │                  │              ▲                                       │
//!   │                  ▼              │                                       │
//!   │   TCP ──▶ axum router    HealthMonitor ──▶ QueueHealth                  │
//!   │          /api/can-we-build-it ◀──────────────────┘                      │
//!   └─────────────────────────────────────────────────────────────────────────┘
//!                                                          │ completion signal
//!                                                          ▼
//!                          "Deployed on verticle: <id>" / "Deployment error: <cause>"
//! ```

use bob_apiserver::config::loader;
use bob_apiserver::lifecycle::{Bootstrapper, RuntimeContext, RuntimeOptions};
use bob_apiserver::observability::{logging, metrics};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loaded = loader::load()?;
    let config = loaded.config;

    let runtime = RuntimeOptions::from_config(&config.runtime).build()?;

    runtime.block_on(async move {
        logging::init(&config.observability);

        tracing::info!("bob-apiserver v{} starting", env!("CARGO_PKG_VERSION"));

        for fallback in &loaded.fallbacks {
            tracing::warn!(
                variable = fallback.variable,
                rejected = %fallback.rejected,
                using = %fallback.fallback,
                "Ignoring unparseable environment value"
            );
        }

        tracing::info!(
            bind_address = %config.api.bind_address(),
            spec_path = %config.api.spec_path,
            queue = %format!("{}:{}", config.queue.host, config.queue.port),
            storage = %format!(
                "{}:{}/{}",
                config.storage.host, config.storage.port, config.storage.database
            ),
            "Configuration loaded"
        );

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse() {
                Ok(addr) => metrics::init_metrics(addr),
                Err(_) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                ),
            }
        }

        let state = Bootstrapper::new(config).run(RuntimeContext::new()).await;
        tracing::info!(state = ?state, "Shutdown complete");
    });

    Ok(())
}
