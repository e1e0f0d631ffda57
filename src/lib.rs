//! Bob API server library.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod queue;
pub mod resilience;
pub mod storage;

pub use config::schema::BobConfig;
pub use http::ApiServer;
pub use lifecycle::{Bootstrapper, RuntimeContext, Shutdown};
pub use queue::QueueClient;
pub use storage::StorageClient;
