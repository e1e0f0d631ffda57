//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Runtime (runtime.rs):
//!     RuntimeOptions → tokio runtime
//!     RuntimeContext::deploy(unit) → DeploymentHandle (completion signal)
//!
//! Startup (startup.rs):
//!     Create storage + queue clients → Deploy API server → Await completion → Log outcome
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Units drain → Connections closed → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Deployment failure is reported, not fatal
//! - Shutdown has one overall deadline: units still running then are aborted

pub mod runtime;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use runtime::{
    DeployError, Deployable, DeploymentHandle, DeploymentId, RuntimeContext, RuntimeOptions,
};
pub use shutdown::Shutdown;
pub use startup::{BootstrapState, Bootstrapper, DeploymentOutcome};
