//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, thresholds > 0)
//! - Check that hosts and addresses are well-formed before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BobConfig → Result<(), Vec<ValidationError>>
//! - Runs after the environment overlay, right before startup

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::BobConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &BobConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.api.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "api.host" });
    } else if !is_valid_host(&config.api.host) {
        errors.push(ValidationError::InvalidAddress {
            field: "api.host",
            value: config.api.host.clone(),
        });
    }
    if config.api.port == 0 {
        errors.push(ValidationError::Zero { field: "api.port" });
    }
    if config.api.spec_path.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "api.spec_path" });
    }
    if config.api.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "api.request_timeout_secs",
        });
    }

    if config.queue.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "queue.host" });
    }
    if config.queue.port == 0 {
        errors.push(ValidationError::Zero { field: "queue.port" });
    }

    if config.storage.database.trim().is_empty() {
        errors.push(ValidationError::Empty {
            field: "storage.database",
        });
    }
    if config.storage.host.trim().is_empty() {
        errors.push(ValidationError::Empty {
            field: "storage.host",
        });
    }
    if config.storage.port == 0 {
        errors.push(ValidationError::Zero {
            field: "storage.port",
        });
    }
    if config.storage.max_connections == 0 {
        errors.push(ValidationError::Zero {
            field: "storage.max_connections",
        });
    }

    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "health_check.interval_ms",
        });
    }
    if config.health_check.unhealthy_threshold == 0 {
        errors.push(ValidationError::Zero {
            field: "health_check.unhealthy_threshold",
        });
    }
    if config.health_check.healthy_threshold == 0 {
        errors.push(ValidationError::Zero {
            field: "health_check.healthy_threshold",
        });
    }

    if config.runtime.worker_threads == Some(0) {
        errors.push(ValidationError::Zero {
            field: "runtime.worker_threads",
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An IP literal or a DNS name the listener can resolve.
fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
