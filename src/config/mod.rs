//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (schema.rs)
//!     → optional TOML file named by BOB_CONFIG (loader.rs)
//!     → environment overrides (env.rs)
//!     → validation.rs (semantic checks)
//!     → BobConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow running with no config at all
//! - Unparseable numeric env values fall back instead of failing startup
//! - Environment access goes through a lookup function so tests stay hermetic

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, LoadedConfig};
pub use schema::{
    ApiConfig, BobConfig, HealthCheckConfig, LogFormat, ObservabilityConfig, QueueConfig,
    RuntimeConfig, StorageConfig,
};
