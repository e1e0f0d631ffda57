//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connecting to the broker:
//!     → retries.rs (bounded attempts)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Every retry loop is bounded; the bound comes from configuration
//! - Jittered backoff prevents thundering herd when many nodes restart

pub mod backoff;
pub mod retries;

pub use retries::{retry_with_backoff, RetryPolicy};
