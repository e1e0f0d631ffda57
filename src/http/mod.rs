//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID on the trace span)
//!     → middleware.rs (request count and latency per route)
//!     → handlers.rs (health, spec document, 404 fallback)
//!     → Send to client
//! ```
//!
//! spec.rs owns the OpenAPI document the unit is configured from.

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;
pub mod spec;

pub use request::X_REQUEST_ID;
pub use server::ApiServer;
pub use spec::{ApiSpec, SpecError};
