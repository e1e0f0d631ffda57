//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (monitor.rs):
//!     Periodic timer
//!     → Check queue connection (reconnect once if lost)
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//!
//! Readers:
//!     → GET /api/can-we-build-it
//!     → bob_queue_healthy gauge
//! ```

pub mod monitor;
pub mod state;

pub use monitor::HealthMonitor;
pub use state::{HealthState, QueueHealth};
