//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the storage and queue clients and the API server unit from configuration
//! - Deploy the unit and wait for its completion signal
//! - Report the outcome on the console
//! - Keep the process alive until asked to stop
//!
//! # Design Decisions
//! - A failed deployment is logged, never fatal
//! - Nothing runs "after deployment" until deployment has actually finished
//! - A shutdown signal during deployment cancels it instead of waiting it out

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::BobConfig;
use crate::http::ApiServer;
use crate::lifecycle::runtime::{DeployError, Deployable, DeploymentId, RuntimeContext};
use crate::lifecycle::signals::wait_for_shutdown;
use crate::observability::metrics;
use crate::queue::QueueClient;
use crate::storage::StorageClient;

/// How a deployment ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Deployed(DeploymentId),
    Failed(String),
}

impl DeploymentOutcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self, DeploymentOutcome::Deployed(_))
    }

    /// Log the outcome line and count it.
    pub fn report(&self) {
        match self {
            DeploymentOutcome::Deployed(_) => tracing::info!("{}", self),
            DeploymentOutcome::Failed(_) => tracing::error!("{}", self),
        }
        metrics::record_deployment(self.is_deployed());
    }
}

impl From<Result<DeploymentId, DeployError>> for DeploymentOutcome {
    fn from(result: Result<DeploymentId, DeployError>) -> Self {
        match result {
            Ok(id) => DeploymentOutcome::Deployed(id),
            Err(e) => DeploymentOutcome::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentOutcome::Deployed(id) => write!(f, "Deployed on verticle: {}", id),
            DeploymentOutcome::Failed(cause) => write!(f, "Deployment error: {}", cause),
        }
    }
}

/// `Starting → Deployed | DeployFailed`; there are no other transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Starting,
    Deployed(DeploymentId),
    DeployFailed(String),
}

impl From<DeploymentOutcome> for BootstrapState {
    fn from(outcome: DeploymentOutcome) -> Self {
        match outcome {
            DeploymentOutcome::Deployed(id) => BootstrapState::Deployed(id),
            DeploymentOutcome::Failed(cause) => BootstrapState::DeployFailed(cause),
        }
    }
}

pub struct Bootstrapper {
    config: BobConfig,
    state: BootstrapState,
}

impl Bootstrapper {
    pub fn new(config: BobConfig) -> Self {
        Self {
            config,
            state: BootstrapState::Starting,
        }
    }

    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    /// Create the storage and queue clients and deploy the API server with them.
    pub async fn deploy(&mut self, ctx: &RuntimeContext) -> &BootstrapState {
        let queue = QueueClient::create(self.config.queue.clone());
        let storage = StorageClient::create(self.config.storage.clone(), queue.retry_policy());
        let server = ApiServer::from_config(&self.config, queue, storage);

        tracing::info!(
            address = %server.bind_address(),
            spec = %self.config.api.spec_path,
            "Deploying API server"
        );

        self.deploy_unit(ctx, server).await
    }

    /// Deploy any unit and record the outcome. Only the first call counts.
    pub async fn deploy_unit<U: Deployable>(
        &mut self,
        ctx: &RuntimeContext,
        unit: U,
    ) -> &BootstrapState {
        if self.state != BootstrapState::Starting {
            tracing::warn!(state = ?self.state, "Bootstrap already finished, ignoring deploy");
            return &self.state;
        }

        let outcome = DeploymentOutcome::from(ctx.deploy(unit).completion().await);
        outcome.report();
        self.state = outcome.into();
        &self.state
    }

    /// Deploy, then run until `signal` resolves and shut the context down.
    ///
    /// `signal` is watched during deployment too, so a stop request while
    /// connections are still being retried goes straight to the graceful close.
    pub async fn run_until<S>(mut self, ctx: RuntimeContext, signal: S) -> BootstrapState
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(signal);

        let interrupted = tokio::select! {
            _ = self.deploy(&ctx) => false,
            _ = &mut signal => true,
        };

        if interrupted {
            tracing::warn!("Shutdown requested before deployment finished");
        } else {
            if let BootstrapState::DeployFailed(_) = self.state {
                tracing::warn!("Continuing without a deployed API server");
            }
            signal.await;
        }

        let timeout = Duration::from_secs(self.config.runtime.shutdown_timeout_secs);
        ctx.close(timeout).await;
        self.state
    }

    /// [`Bootstrapper::run_until`] driven by SIGINT/SIGTERM.
    pub async fn run(self, ctx: RuntimeContext) -> BootstrapState {
        self.run_until(ctx, wait_for_shutdown()).await
    }
}
