//! Runtime context and unit deployment.
//!
//! # Responsibilities
//! - Build the tokio runtime from explicit startup options
//! - Deploy units asynchronously and report completion through a channel
//! - Track deployed units so shutdown can wait for them
//!
//! # Design Decisions
//! - Deployment never blocks the caller; [`DeploymentHandle`] is the only join
//! - A failed deployment leaves the context usable for further deployments
//! - Every unit receives its shutdown subscription before it starts
//! - Shutdown cancels deployments still starting; the context then refuses new units

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::http::spec::SpecError;
use crate::lifecycle::shutdown::Shutdown;
use crate::queue::QueueError;
use crate::storage::StorageError;

/// Settings applied before the runtime exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub worker_threads: Option<usize>,
    pub thread_name: String,
}

impl RuntimeOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            worker_threads: config.worker_threads,
            thread_name: config.thread_name.clone(),
        }
    }

    /// Build a multi-thread runtime with IO and time drivers enabled.
    pub fn build(&self) -> std::io::Result<tokio::runtime::Runtime> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name(self.thread_name.clone());
        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads);
        }
        builder.build()
    }
}

/// Identifier assigned to a successfully deployed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeploymentId(Uuid);

impl DeploymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("deployment of {0} ended without reporting a result")]
    Aborted(String),

    #[error("deployment of {0} cancelled by shutdown")]
    Cancelled(String),
}

/// A unit that can be deployed onto the runtime.
#[async_trait]
pub trait Deployable: Send + 'static {
    fn name(&self) -> &str;

    /// Bring the unit up. The returned task is the unit's serving loop and
    /// must finish once `shutdown` fires.
    async fn start(
        &mut self,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, DeployError>;
}

/// Resolves once a deployment has succeeded or failed.
pub struct DeploymentHandle {
    name: String,
    rx: oneshot::Receiver<Result<DeploymentId, DeployError>>,
}

impl DeploymentHandle {
    pub async fn completion(self) -> Result<DeploymentId, DeployError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(DeployError::Aborted(self.name)),
        }
    }
}

struct Deployment {
    id: DeploymentId,
    name: String,
    task: JoinHandle<()>,
}

/// Process-wide context that units are deployed into.
#[derive(Clone)]
pub struct RuntimeContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    shutdown: Shutdown,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    closed: bool,
    deployments: Vec<Deployment>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                shutdown: Shutdown::new(),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.inner.shutdown
    }

    /// Start `unit` in the background.
    ///
    /// A start still in progress when shutdown fires is dropped and reported
    /// as [`DeployError::Cancelled`].
    pub fn deploy<U: Deployable>(&self, mut unit: U) -> DeploymentHandle {
        let name = unit.name().to_string();
        let (tx, rx) = oneshot::channel();
        let shutdown = self.inner.shutdown.subscribe();
        let mut cancel = self.inner.shutdown.subscribe();
        let already_closed = self.inner.shutdown.is_triggered();
        let ctx = self.clone();
        let unit_name = name.clone();

        tracing::debug!(unit = %name, "Deploying unit");

        tokio::spawn(async move {
            let started = if already_closed {
                Err(DeployError::Cancelled(unit_name.clone()))
            } else {
                tokio::select! {
                    result = unit.start(shutdown) => result,
                    _ = cancel.recv() => Err(DeployError::Cancelled(unit_name.clone())),
                }
            };
            let result = started.and_then(|task| ctx.register(unit_name, task));
            let _ = tx.send(result);
        });

        DeploymentHandle { name, rx }
    }

    pub fn deployment_ids(&self) -> Vec<DeploymentId> {
        self.lock_registry().deployments.iter().map(|d| d.id).collect()
    }

    /// Broadcast shutdown and wait for every deployed unit to stop.
    ///
    /// `timeout` bounds the whole drain. Units still running at the deadline
    /// are aborted.
    pub async fn close(&self, timeout: Duration) {
        self.inner.shutdown.trigger();
        let deployments = {
            let mut registry = self.lock_registry();
            registry.closed = true;
            std::mem::take(&mut registry.deployments)
        };

        let deadline = tokio::time::Instant::now() + timeout;
        for deployment in deployments {
            let abort = deployment.task.abort_handle();
            match tokio::time::timeout_at(deadline, deployment.task).await {
                Ok(Ok(())) => {
                    tracing::info!(id = %deployment.id, unit = %deployment.name, "Unit stopped");
                }
                Ok(Err(e)) => {
                    tracing::error!(id = %deployment.id, unit = %deployment.name, error = %e, "Unit task failed");
                }
                Err(_) => {
                    tracing::warn!(id = %deployment.id, unit = %deployment.name, "Unit did not stop in time, aborting");
                    abort.abort();
                }
            }
        }
    }

    fn register(&self, name: String, task: JoinHandle<()>) -> Result<DeploymentId, DeployError> {
        let mut registry = self.lock_registry();
        if registry.closed {
            tracing::warn!(unit = %name, "Unit came up after shutdown began, aborting");
            task.abort();
            return Err(DeployError::Cancelled(name));
        }

        let id = DeploymentId::new();
        registry.deployments.push(Deployment { id, name, task });
        Ok(id)
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        // A panic while holding this lock leaves the registry itself intact.
        self.inner
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    #[async_trait]
    impl Deployable for Idle {
        fn name(&self) -> &str {
            "idle"
        }

        async fn start(
            &mut self,
            mut shutdown: broadcast::Receiver<()>,
        ) -> Result<JoinHandle<()>, DeployError> {
            Ok(tokio::spawn(async move {
                let _ = shutdown.recv().await;
            }))
        }
    }

    struct Broken;

    #[async_trait]
    impl Deployable for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn start(
            &mut self,
            _shutdown: broadcast::Receiver<()>,
        ) -> Result<JoinHandle<()>, DeployError> {
            Err(DeployError::Bind {
                address: "127.0.0.1:1".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connect refused"),
            })
        }
    }

    /// Ignores shutdown entirely.
    struct Stubborn;

    #[async_trait]
    impl Deployable for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        async fn start(
            &mut self,
            _shutdown: broadcast::Receiver<()>,
        ) -> Result<JoinHandle<()>, DeployError> {
            Ok(tokio::spawn(std::future::pending()))
        }
    }

    /// Never finishes starting.
    struct Hanging;

    #[async_trait]
    impl Deployable for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn start(
            &mut self,
            _shutdown: broadcast::Receiver<()>,
        ) -> Result<JoinHandle<()>, DeployError> {
            std::future::pending().await
        }
    }

    struct Panicking;

    #[async_trait]
    impl Deployable for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn start(
            &mut self,
            _shutdown: broadcast::Receiver<()>,
        ) -> Result<JoinHandle<()>, DeployError> {
            panic!("boom");
        }
    }

    #[test]
    fn options_build_a_runtime() {
        let options = RuntimeOptions {
            worker_threads: Some(2),
            thread_name: "test-runtime".to_string(),
        };
        let runtime = options.build().unwrap();
        assert_eq!(runtime.block_on(async { 1 + 1 }), 2);
    }

    #[tokio::test]
    async fn successful_deploy_is_registered() {
        let ctx = RuntimeContext::new();
        let id = ctx.deploy(Idle).completion().await.unwrap();
        assert_eq!(ctx.deployment_ids(), vec![id]);
        ctx.close(Duration::from_secs(1)).await;
        assert!(ctx.deployment_ids().is_empty());
    }

    #[tokio::test]
    async fn failed_deploy_leaves_context_usable() {
        let ctx = RuntimeContext::new();
        let err = ctx.deploy(Broken).completion().await.unwrap_err();
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:1: connect refused");
        assert!(ctx.deployment_ids().is_empty());

        assert!(ctx.deploy(Idle).completion().await.is_ok());
        assert_eq!(ctx.deployment_ids().len(), 1);
        ctx.close(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn panicking_start_reports_aborted() {
        let ctx = RuntimeContext::new();
        let err = ctx.deploy(Panicking).completion().await.unwrap_err();
        assert!(matches!(err, DeployError::Aborted(name) if name == "panicking"));
    }

    #[tokio::test]
    async fn deployment_ids_are_unique() {
        let ctx = RuntimeContext::new();
        let a = ctx.deploy(Idle).completion().await.unwrap();
        let b = ctx.deploy(Idle).completion().await.unwrap();
        assert_ne!(a, b);
        ctx.close(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn close_shares_one_deadline_across_units() {
        let ctx = RuntimeContext::new();
        for _ in 0..3 {
            ctx.deploy(Stubborn).completion().await.unwrap();
        }

        let started = std::time::Instant::now();
        ctx.close(Duration::from_millis(300)).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(800), "{:?}", elapsed);
        assert!(ctx.deployment_ids().is_empty());
    }

    #[tokio::test]
    async fn close_cancels_deployments_still_starting() {
        let ctx = RuntimeContext::new();
        let handle = ctx.deploy(Hanging);
        tokio::task::yield_now().await;

        ctx.close(Duration::from_secs(1)).await;

        let err = tokio::time::timeout(Duration::from_secs(1), handle.completion())
            .await
            .expect("deployment was not cancelled")
            .unwrap_err();
        assert!(matches!(err, DeployError::Cancelled(name) if name == "hanging"));
        assert!(ctx.deployment_ids().is_empty());
    }

    #[tokio::test]
    async fn deploy_after_close_is_refused() {
        let ctx = RuntimeContext::new();
        ctx.close(Duration::from_secs(1)).await;

        let err = ctx.deploy(Idle).completion().await.unwrap_err();
        assert_eq!(err.to_string(), "deployment of idle cancelled by shutdown");
        assert!(ctx.deployment_ids().is_empty());
    }
}
