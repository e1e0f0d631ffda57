//! AMQP client handle.
//!
//! # Responsibilities
//! - Hold the broker connection settings
//! - Establish the connection on demand, retrying with backoff
//! - Report connection liveness to the health monitor
//! - Close the connection on shutdown
//!
//! Creating a [`QueueClient`] performs no I/O; the connection is opened by
//! [`QueueClient::start`], normally from a deployed unit's startup.

use std::sync::Arc;

use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{Connection, ConnectionProperties};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::QueueConfig;
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Reply code sent with a normal connection close.
const REPLY_SUCCESS: u16 = 200;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to amqp://{address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to close queue connection: {0}")]
    Close(#[source] lapin::Error),
}

/// Shared handle to the message broker. Cheap to clone.
#[derive(Clone)]
pub struct QueueClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: QueueConfig,
    connection: RwLock<Option<Connection>>,
}

impl QueueClient {
    /// Create a client for the given broker. Does not connect.
    pub fn create(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connection: RwLock::new(None),
            }),
        }
    }

    /// The broker address, without credentials.
    pub fn address(&self) -> String {
        let config = &self.inner.config;
        format!("{}:{}", config.host, config.port)
    }

    /// AMQP URI built from the configured host, credentials and vhost.
    pub fn uri(&self) -> AMQPUri {
        let config = &self.inner.config;
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: config.user.clone(),
                    password: config.password.clone(),
                },
                host: config.host.clone(),
                port: config.port,
            },
            vhost: config.vhost.clone(),
            ..Default::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let config = &self.inner.config;
        RetryPolicy {
            max_retries: config.connection_retries,
            base_delay_ms: config.retry_delay_ms,
            max_delay_ms: config.max_retry_delay_ms.max(config.retry_delay_ms),
        }
    }

    /// Connect to the broker, retrying per the configured policy.
    ///
    /// Returns immediately if a live connection already exists.
    pub async fn start(&self) -> Result<(), QueueError> {
        if self.is_connected().await {
            return Ok(());
        }

        tracing::info!(
            address = %self.address(),
            retries = self.inner.config.connection_retries,
            "Connecting to message queue"
        );

        let connection =
            retry_with_backoff(self.retry_policy(), "queue connect", || self.connect_once()).await?;
        self.store(connection).await;

        tracing::info!(address = %self.address(), "Message queue connected");
        Ok(())
    }

    /// A single connection attempt, replacing any dead connection.
    pub async fn reconnect(&self) -> Result<(), QueueError> {
        let connection = self.connect_once().await?;
        self.store(connection).await;
        tracing::info!(address = %self.address(), "Message queue reconnected");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.inner
            .connection
            .read()
            .await
            .as_ref()
            .is_some_and(|conn| conn.status().connected())
    }

    /// Close the connection if one is open.
    pub async fn stop(&self) -> Result<(), QueueError> {
        let connection = self.inner.connection.write().await.take();
        match connection {
            Some(conn) if conn.status().connected() => {
                conn.close(REPLY_SUCCESS, "OK")
                    .await
                    .map_err(QueueError::Close)?;
                tracing::info!(address = %self.address(), "Message queue connection closed");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn connect_once(&self) -> Result<Connection, QueueError> {
        let properties =
            ConnectionProperties::default().with_connection_name("bob-apiserver".into());
        Connection::connect_uri(self.uri(), properties)
            .await
            .map_err(|source| QueueError::Connect {
                address: self.address(),
                source,
            })
    }

    async fn store(&self, connection: Connection) {
        let previous = self.inner.connection.write().await.replace(connection);
        if let Some(old) = previous {
            if old.status().connected() {
                let _ = old.close(REPLY_SUCCESS, "replaced").await;
            }
        }
    }
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
