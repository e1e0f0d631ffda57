//! Postgres storage handle.
//!
//! # Responsibilities
//! - Hold the database connection settings
//! - Open the connection pool, retrying with backoff
//! - Close the pool on shutdown
//!
//! Like the queue client, creating a [`StorageClient`] performs no I/O.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::StorageConfig;
use crate::resilience::{retry_with_backoff, RetryPolicy};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to postgres://{address}/{database}: {source}")]
    Connect {
        address: String,
        database: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Shared handle to the storage database. Cheap to clone.
#[derive(Clone)]
pub struct StorageClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: StorageConfig,
    retry: RetryPolicy,
    pool: RwLock<Option<PgPool>>,
}

impl StorageClient {
    /// Create a client for the given database. Does not connect.
    pub fn create(config: StorageConfig, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                retry,
                pool: RwLock::new(None),
            }),
        }
    }

    pub fn address(&self) -> String {
        let config = &self.inner.config;
        format!("{}:{}", config.host, config.port)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let config = &self.inner.config;
        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
    }

    /// Open the pool, retrying per the shared connection policy.
    ///
    /// Returns immediately if a pool is already open.
    pub async fn start(&self) -> Result<(), StorageError> {
        if self.is_connected().await {
            return Ok(());
        }

        tracing::info!(
            address = %self.address(),
            database = %self.inner.config.database,
            retries = self.inner.retry.max_retries,
            "Connecting to storage"
        );

        let pool =
            retry_with_backoff(self.inner.retry, "storage connect", || self.connect_once()).await?;
        *self.inner.pool.write().await = Some(pool);

        tracing::info!(address = %self.address(), "Storage connected");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.inner
            .pool
            .read()
            .await
            .as_ref()
            .is_some_and(|pool| !pool.is_closed())
    }

    /// The open pool, if any.
    pub async fn pool(&self) -> Option<PgPool> {
        self.inner.pool.read().await.clone()
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn stop(&self) {
        let pool = self.inner.pool.write().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::info!(address = %self.address(), "Storage connection closed");
        }
    }

    async fn connect_once(&self) -> Result<PgPool, StorageError> {
        let config = &self.inner.config;
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(self.connect_options())
            .await
            .map_err(|source| StorageError::Connect {
                address: self.address(),
                database: config.database.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("address", &self.address())
            .field("database", &self.inner.config.database)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn unreachable() -> StorageClient {
        StorageClient::create(
            StorageConfig {
                host: "127.0.0.1".to_string(),
                port: closed_port(),
                connect_timeout_secs: 1,
                ..StorageConfig::default()
            },
            RetryPolicy {
                max_retries: 1,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
        )
    }

    #[test]
    fn connect_options_follow_config() {
        let client = StorageClient::create(
            StorageConfig {
                database: "ci".to_string(),
                host: "db".to_string(),
                port: 5433,
                user: "bobby".to_string(),
                ..StorageConfig::default()
            },
            RetryPolicy {
                max_retries: 0,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
        );
        let options = client.connect_options();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_username(), "bobby");
        assert_eq!(options.get_database(), Some("ci"));
    }

    #[test]
    fn debug_output_hides_credentials() {
        let client = StorageClient::create(
            StorageConfig {
                password: "secret".to_string(),
                ..StorageConfig::default()
            },
            RetryPolicy {
                max_retries: 0,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
        );
        let rendered = format!("{:?}", client);
        assert!(rendered.contains("localhost:5432"));
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn start_against_closed_port_fails() {
        let client = unreachable();
        assert!(!client.is_connected().await);

        let err = client.start().await.unwrap_err();
        assert!(err.to_string().contains("127.0.0.1"));
        assert!(err.to_string().contains("/bob"));
        assert!(client.pool().await.is_none());
    }

    #[tokio::test]
    async fn stop_without_pool_is_a_no_op() {
        let client = unreachable();
        client.stop().await;
        assert!(!client.is_connected().await);
    }
}
