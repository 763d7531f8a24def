//! Rate limit bucket
//!
//! A bucket counts the calls left under one key until its reset instant.
//! Two flavours share the same accounting:
//!
//! - **Server driven** (REST): the limit is unknown until the first response
//!   reports it; until then calls pass freely.
//! - **Fixed window** (gateway commands, identify): `limit` calls per `window`,
//!   the window opening on the first call after a reset.

use std::time::Duration;
use tokio::time::Instant;

/// Rate limit bucket for a single key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    key: String,
    remaining: u32,
    /// 0 while the server has not reported a limit yet
    limit: u32,
    reset_at: Option<Instant>,
    window: Option<Duration>,
}

impl Bucket {
    /// Bucket whose limits are learned from responses
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            remaining: 0,
            limit: 0,
            reset_at: None,
            window: None,
        }
    }

    /// Bucket allowing `limit` calls per `window`
    pub fn fixed(key: impl Into<String>, limit: u32, window: Duration) -> Self {
        Self {
            key: key.into(),
            remaining: limit,
            limit,
            reset_at: None,
            window: Some(window),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn reset_at(&self) -> Option<Instant> {
        self.reset_at
    }

    /// Take one call from the bucket
    ///
    /// Returns zero when the call may go out now, otherwise how long to wait
    /// before asking again. Nothing is consumed when a wait is returned.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        self.refresh(now);

        if self.limit == 0 {
            return Duration::ZERO;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            if self.reset_at.is_none() {
                self.reset_at = self.window.map(|window| now + window);
            }
            return Duration::ZERO;
        }

        match self.reset_at {
            Some(reset_at) => reset_at.saturating_duration_since(now),
            // Exhausted with no known reset: the server will tell us on the
            // next response, let the call through.
            None => Duration::ZERO,
        }
    }

    /// Overwrite the bucket state with what the server reported
    pub fn update(&mut self, remaining: u32, reset_at: Instant, limit: Option<u32>) {
        if let Some(limit) = limit {
            self.limit = limit;
        } else if self.limit == 0 {
            self.limit = remaining.max(1);
        }
        self.remaining = remaining.min(self.limit);
        self.reset_at = Some(reset_at);
    }

    /// Mark the bucket empty until `reset_at`
    pub fn exhaust(&mut self, reset_at: Instant) {
        self.limit = self.limit.max(1);
        self.remaining = 0;
        self.reset_at = Some(reset_at);
    }

    fn refresh(&mut self, now: Instant) {
        if let Some(reset_at) = self.reset_at {
            if now >= reset_at {
                self.remaining = self.limit;
                self.reset_at = None;
            }
        }
    }
}
