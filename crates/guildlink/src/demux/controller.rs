//! Registration lifetimes
//!
//! A controller decides how long a registration stays. The demultiplexer
//! charges it once per invocation that passed the middlewares and drops
//! the registration as soon as it reports dead.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Lifetime policy of one registration
pub trait Controller: Send + Sync {
    /// True once the registration must not run again
    fn is_dead(&self) -> bool;

    /// Record one invocation
    fn update(&self);

    fn on_insert(&self) {}

    fn on_remove(&self) {}
}

/// Call-count and deadline limits, whichever runs out first
#[derive(Debug)]
pub struct Ctrl {
    remaining: Option<AtomicU32>,
    deadline: Option<Instant>,
}

impl Ctrl {
    /// Allow `calls` invocations
    pub fn calls(calls: u32) -> Self {
        Self {
            remaining: Some(AtomicU32::new(calls)),
            deadline: None,
        }
    }

    /// Stay registered until `deadline`
    pub fn until(deadline: Instant) -> Self {
        Self {
            remaining: None,
            deadline: Some(deadline),
        }
    }

    /// Stay registered for `ttl` from now
    pub fn lasting(ttl: Duration) -> Self {
        Self::until(Instant::now() + ttl)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining.as_ref().map(|r| r.load(Ordering::Acquire))
    }
}

impl Controller for Ctrl {
    fn is_dead(&self) -> bool {
        self.remaining() == Some(0) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn update(&self) {
        if let Some(remaining) = &self.remaining {
            let _ = remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }
}
