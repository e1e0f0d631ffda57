//! Shared utilities for integration tests.

use std::io::Write;
use std::net::SocketAddr;

use bob_apiserver::config::{BobConfig, QueueConfig, StorageConfig};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const SPEC: &str = "openapi: 3.0.0\ninfo:\n  title: Bob\n  version: 1.0.0\npaths:\n  /can-we-build-it:\n    get: {}\n";

/// Write a minimal OpenAPI document to a temp file.
pub fn spec_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SPEC.as_bytes()).unwrap();
    file
}

/// A localhost port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Config pointing at `spec_path`, an ephemeral HTTP port, and a database and
/// broker that both refuse connections. Connections are tried once.
pub fn config_with_unreachable_backends(spec_path: &str) -> BobConfig {
    let mut config = BobConfig::default();
    config.api.host = "127.0.0.1".to_string();
    config.api.port = closed_port();
    config.api.spec_path = spec_path.to_string();
    config.queue = QueueConfig {
        host: "127.0.0.1".to_string(),
        port: closed_port(),
        connection_retries: 0,
        ..QueueConfig::default()
    };
    config.storage = StorageConfig {
        host: "127.0.0.1".to_string(),
        port: closed_port(),
        connect_timeout_secs: 1,
        ..StorageConfig::default()
    };
    config.runtime.shutdown_timeout_secs = 2;
    config
}

/// Minimal HTTP/1.1 GET returning the status code and body.
pub async fn http_get(addr: SocketAddr, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw).to_string();

    let status = text
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}
