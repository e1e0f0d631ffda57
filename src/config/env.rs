//! Environment variable overlay.
//!
//! Every variable is optional. Numeric variables that fail to parse, or that
//! are zero where zero is meaningless (ports, the health check interval), fall
//! back to the value already in the config and are reported as [`EnvFallback`]s so
//! the caller can log them once logging is up.

use std::fmt;
use std::str::FromStr;

use crate::config::schema::{BobConfig, LogFormat};

pub const PORT: &str = "BOB_PORT";
pub const API_HOST: &str = "BOB_API_HOST";
pub const API_SPEC: &str = "BOB_API_SPEC";
pub const QUEUE_HOST: &str = "BOB_QUEUE_HOST";
pub const QUEUE_PORT: &str = "BOB_QUEUE_PORT";
pub const QUEUE_USER: &str = "BOB_QUEUE_USER";
pub const QUEUE_PASSWORD: &str = "BOB_QUEUE_PASSWORD";
pub const CONNECTION_RETRY_ATTEMPTS: &str = "BOB_CONNECTION_RETRY_ATTEMPTS";
pub const CONNECTION_RETRY_DELAY: &str = "BOB_CONNECTION_RETRY_DELAY";
pub const STORAGE_DATABASE: &str = "BOB_STORAGE_DATABASE";
pub const STORAGE_HOST: &str = "BOB_STORAGE_HOST";
pub const STORAGE_PORT: &str = "BOB_STORAGE_PORT";
pub const STORAGE_USER: &str = "BOB_STORAGE_USER";
pub const STORAGE_PASSWORD: &str = "BOB_STORAGE_PASSWORD";
pub const HEALTH_CHECK_FREQ: &str = "BOB_HEALTH_CHECK_FREQ";
pub const CONFIG_FILE: &str = "BOB_CONFIG";
pub const LOG_FORMAT: &str = "BOB_LOG_FORMAT";

/// A variable that was set but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFallback {
    pub variable: &'static str,
    pub rejected: String,
    pub fallback: String,
}

/// Ports must be in `1..=65535`.
fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|port| *port > 0)
}

fn parse_nonzero(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|value| *value > 0)
}

fn parse_any<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse::<T>().ok()
}

/// Apply environment overrides on top of `config`.
///
/// An unusable `BOB_PORT` (non-numeric, zero, out of range) keeps the value
/// already in `config`, which is `7777` unless a config file set another.
pub fn apply_env<F>(config: &mut BobConfig, lookup: F) -> Vec<EnvFallback>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = Overlay {
        lookup: &lookup,
        fallbacks: Vec::new(),
    };

    env.parsed(&mut config.api.port, PORT, parse_port);
    env.string(&mut config.api.host, API_HOST);
    env.string(&mut config.api.spec_path, API_SPEC);

    env.string(&mut config.queue.host, QUEUE_HOST);
    env.parsed(&mut config.queue.port, QUEUE_PORT, parse_port);
    env.string(&mut config.queue.user, QUEUE_USER);
    env.string(&mut config.queue.password, QUEUE_PASSWORD);
    env.parsed(
        &mut config.queue.connection_retries,
        CONNECTION_RETRY_ATTEMPTS,
        parse_any,
    );
    env.parsed(
        &mut config.queue.retry_delay_ms,
        CONNECTION_RETRY_DELAY,
        parse_any,
    );

    env.string(&mut config.storage.database, STORAGE_DATABASE);
    env.string(&mut config.storage.host, STORAGE_HOST);
    env.parsed(&mut config.storage.port, STORAGE_PORT, parse_port);
    env.string(&mut config.storage.user, STORAGE_USER);
    env.string(&mut config.storage.password, STORAGE_PASSWORD);

    env.parsed(
        &mut config.health_check.interval_ms,
        HEALTH_CHECK_FREQ,
        parse_nonzero,
    );

    env.parsed::<LogFormat>(&mut config.observability.log_format, LOG_FORMAT, parse_any);

    env.fallbacks
}

struct Overlay<'a, F> {
    lookup: &'a F,
    fallbacks: Vec<EnvFallback>,
}

impl<F> Overlay<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&mut self, slot: &mut String, variable: &'static str) {
        if let Some(value) = (self.lookup)(variable) {
            *slot = value;
        }
    }

    /// Replace `slot` when `parse` accepts the value, otherwise record a fallback.
    fn parsed<T>(&mut self, slot: &mut T, variable: &'static str, parse: fn(&str) -> Option<T>)
    where
        T: fmt::Display,
    {
        let Some(raw) = (self.lookup)(variable) else { return };
        match parse(&raw) {
            Some(value) => *slot = value,
            None => self.fallbacks.push(EnvFallback {
                variable,
                rejected: raw,
                fallback: slot.to_string(),
            }),
        }
    }
}
