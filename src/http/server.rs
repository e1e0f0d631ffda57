//! API server unit.
//!
//! # Responsibilities
//! - Load the API specification document
//! - Open the storage pool, when the unit has storage
//! - Bring up the queue connection the API publishes through
//! - Bind the HTTP listener and serve until shutdown
//! - Run the queue health monitor alongside the server
//! - Close the queue and storage connections once serving stops

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::host_port;
use crate::config::{BobConfig, HealthCheckConfig};
use crate::health::{HealthMonitor, QueueHealth};
use crate::http::handlers::{self, AppState};
use crate::http::middleware::track_metrics;
use crate::http::request::make_span;
use crate::http::spec::ApiSpec;
use crate::lifecycle::runtime::{DeployError, Deployable};
use crate::queue::QueueClient;
use crate::storage::StorageClient;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The HTTP-serving unit, configured from an API specification file.
pub struct ApiServer {
    spec_path: PathBuf,
    host: String,
    port: u16,
    queue: QueueClient,
    storage: Option<StorageClient>,
    health_config: HealthCheckConfig,
    request_timeout: Duration,
}

impl ApiServer {
    pub fn new(
        spec_path: impl Into<PathBuf>,
        host: impl Into<String>,
        port: u16,
        queue: QueueClient,
    ) -> Self {
        Self {
            spec_path: spec_path.into(),
            host: host.into(),
            port,
            queue,
            storage: None,
            health_config: HealthCheckConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(config: &BobConfig, queue: QueueClient, storage: StorageClient) -> Self {
        Self::new(
            config.api.spec_path.clone(),
            config.api.host.clone(),
            config.api.port,
            queue,
        )
        .with_storage(storage)
        .with_health_check(config.health_check.clone())
        .with_request_timeout(Duration::from_secs(config.api.request_timeout_secs))
    }

    /// Require a storage connection before the unit counts as deployed.
    pub fn with_storage(mut self, storage: StorageClient) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_config = config;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn bind_address(&self) -> String {
        host_port(&self.host, self.port)
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/api/can-we-build-it", get(handlers::can_we_build_it))
            .route("/api/spec", get(handlers::api_spec))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Undo a partial start.
    async fn release(&self) {
        close_connections(&self.queue, self.storage.as_ref()).await;
    }
}

async fn close_connections(queue: &QueueClient, storage: Option<&StorageClient>) {
    if let Err(e) = queue.stop().await {
        tracing::warn!(error = %e, "Failed to close queue connection");
    }
    if let Some(storage) = storage {
        storage.stop().await;
    }
}

#[async_trait]
impl Deployable for ApiServer {
    fn name(&self) -> &str {
        "api-server"
    }

    async fn start(
        &mut self,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, DeployError> {
        let spec = ApiSpec::load(&self.spec_path).await?;
        tracing::info!(
            path = %spec.path().display(),
            spec = %spec.summary(),
            "API spec loaded"
        );

        if let Some(storage) = &self.storage {
            storage.start().await?;
        }

        if let Err(e) = self.queue.start().await {
            self.release().await;
            return Err(e.into());
        }

        let address = self.bind_address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.release().await;
                return Err(DeployError::Bind { address, source });
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|source| DeployError::Bind {
                address: address.clone(),
                source,
            })?;

        let health = Arc::new(QueueHealth::new());
        let monitor = HealthMonitor::new(
            self.queue.clone(),
            health.clone(),
            self.health_config.clone(),
        );
        let monitor_task = tokio::spawn(monitor.run(shutdown.resubscribe()));

        let state = AppState {
            spec: Arc::new(spec),
            health,
        };
        let router = Self::build_router(state, self.request_timeout);
        let queue = self.queue.clone();
        let storage = self.storage.clone();
        let mut server_shutdown = shutdown;

        tracing::info!(address = %local_addr, "HTTP server starting");

        Ok(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "HTTP server failed");
            }

            let _ = monitor_task.await;
            close_connections(&queue, storage.as_ref()).await;
            tracing::info!("HTTP server stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueConfig, StorageConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::path::Path;
    use tower::ServiceExt;

    fn router(healthy: bool) -> Router {
        let spec = ApiSpec::parse(
            Path::new("api.yaml"),
            "openapi: 3.0.0\ninfo:\n  title: Bob\n".to_string(),
        )
        .unwrap();
        let health = Arc::new(QueueHealth::new());
        if healthy {
            health.mark_success(1);
        }
        ApiServer::build_router(
            AppState {
                spec: Arc::new(spec),
                health,
            },
            Duration::from_secs(5),
        )
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_reflects_queue_state() {
        let (status, _, body) = get(router(true), "/api/can-we-build-it").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["message"], handlers::HEALTHY_MESSAGE);

        let (status, _, body) = get(router(false), "/api/can-we-build-it").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("Queue unavailable"));
    }

    #[tokio::test]
    async fn spec_endpoint_serves_raw_document() {
        let (status, headers, body) = get(router(true), "/api/spec").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "application/yaml");
        assert!(body.starts_with("openapi: 3.0.0"));
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, _, body) = get(router(true), "/api/pipelines").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"message":"No such route"}"#);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (_, headers, _) = get(router(true), "/api/spec").await;
        assert!(headers.contains_key("x-request-id"));

        let response = router(true)
            .oneshot(
                Request::get("/api/spec")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn missing_spec_fails_before_touching_queue() {
        let mut server = ApiServer::new(
            "/no/such/api.yaml",
            "127.0.0.1",
            0,
            QueueClient::create(QueueConfig::default()),
        );
        let (_tx, rx) = broadcast::channel(1);
        let err = server.start(rx).await.unwrap_err();
        assert!(matches!(err, DeployError::Spec(_)));
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn spec_file() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "openapi: 3.0.0\n").unwrap();
        file
    }

    #[tokio::test]
    async fn unreachable_queue_fails_deploy() {
        let spec = spec_file();
        let queue = QueueClient::create(QueueConfig {
            host: "127.0.0.1".to_string(),
            port: closed_port(),
            connection_retries: 0,
            ..QueueConfig::default()
        });
        let mut server = ApiServer::new(spec.path(), "127.0.0.1", 0, queue);
        let (_tx, rx) = broadcast::channel(1);
        let err = server.start(rx).await.unwrap_err();
        assert!(matches!(err, DeployError::Queue(_)));
    }

    #[tokio::test]
    async fn unreachable_storage_fails_deploy_before_queue() {
        let spec = spec_file();
        let queue = QueueClient::create(QueueConfig::default());
        let retry = queue.retry_policy();
        let storage = StorageClient::create(
            StorageConfig {
                host: "127.0.0.1".to_string(),
                port: closed_port(),
                connect_timeout_secs: 1,
                ..StorageConfig::default()
            },
            crate::resilience::RetryPolicy {
                max_retries: 0,
                ..retry
            },
        );
        let mut server = ApiServer::new(spec.path(), "127.0.0.1", 0, queue.clone()).with_storage(storage);
        let (_tx, rx) = broadcast::channel(1);
        let err = server.start(rx).await.unwrap_err();
        assert!(matches!(err, DeployError::Storage(_)));
        assert!(!queue.is_connected().await);
    }

    #[test]
    fn from_config_uses_api_section() {
        let mut config = BobConfig::default();
        config.api.port = 8080;
        let queue = QueueClient::create(config.queue.clone());
        let storage = StorageClient::create(config.storage.clone(), queue.retry_policy());
        let server = ApiServer::from_config(&config, queue, storage);
        assert_eq!(server.bind_address(), "0.0.0.0:8080");
        assert_eq!(server.request_timeout, Duration::from_secs(30));
        assert!(server.storage.is_some());
    }
}
