//! Message queue subsystem.
//!
//! Only connection management lives here. What gets published or consumed
//! is up to the units holding a [`QueueClient`].

pub mod client;

pub use client::{QueueClient, QueueError};
