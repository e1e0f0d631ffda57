//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! StorageConfig + queue retry policy
//!     → StorageClient::create (no I/O)
//!     → ApiServer::start → StorageClient::start (retrying connect)
//!     → serving task ends → StorageClient::stop
//! ```

pub mod client;

pub use client::{StorageClient, StorageError};
