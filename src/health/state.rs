//! Queue health state machine.
//!
//! # States
//! - Unknown: no check has completed yet
//! - Healthy: broker connection confirmed
//! - Unhealthy: broker unreachable
//!
//! # State Transitions
//! ```text
//! Unknown/Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! Unknown/Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! ```
//!
//! Counters reset on the opposite outcome, so a single flap does not flip
//! the state.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// Thread-safe health tracker shared by the monitor and HTTP handlers.
#[derive(Debug)]
pub struct QueueHealth {
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
}

impl QueueHealth {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Only a confirmed connection counts as healthy.
    pub fn is_healthy(&self) -> bool {
        self.state() == HealthState::Healthy
    }

    /// Report a successful check. Returns the new state if it changed.
    pub fn mark_success(&self, healthy_threshold: usize) -> Option<HealthState> {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Healthy {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.transition(HealthState::Healthy)
        } else {
            None
        }
    }

    /// Report a failed check. Returns the new state if it changed.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> Option<HealthState> {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Unhealthy {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.transition(HealthState::Unhealthy)
        } else {
            None
        }
    }

    fn transition(&self, to: HealthState) -> Option<HealthState> {
        let from = HealthState::from(self.state.swap(to as u8, Ordering::Relaxed));
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        (from != to).then_some(to)
    }
}

impl Default for QueueHealth {
    fn default() -> Self {
        Self::new()
    }
}
