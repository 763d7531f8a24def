//! Keyed rate limiter shared by REST calls and gateway commands
//!
//! Buckets are created lazily per key and live in a `DashMap`; a caller that
//! reserves holds the map shard only for the bookkeeping, never across an
//! await. A global reset, set when the server reports a global limit, blocks
//! every key.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::bucket::Bucket;
use crate::error::ErrorKind;

/// Rate limit errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limited on {key}, retry after {retry_after:?}")]
    RateLimited { key: String, retry_after: Duration },
}

impl RateLimitError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::RateLimit
    }
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Keyed collection of rate limit buckets
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    global_reset: Mutex<Option<Instant>>,
    cancel_on_rate_limit: bool,
}

impl RateLimiter {
    pub fn new(cancel_on_rate_limit: bool) -> Self {
        Self {
            buckets: DashMap::new(),
            global_reset: Mutex::new(None),
            cancel_on_rate_limit,
        }
    }

    pub fn cancel_on_rate_limit(&self) -> bool {
        self.cancel_on_rate_limit
    }

    /// Install a fixed-window bucket, replacing any bucket under that key
    pub fn register_fixed(&self, key: impl Into<String>, limit: u32, window: Duration) {
        let key = key.into();
        self.buckets
            .insert(key.clone(), Bucket::fixed(key, limit, window));
    }

    /// Reserve one call under `key`
    ///
    /// Returns how long the caller must wait before sending; zero means go.
    /// In cancel mode a non-zero wait is returned as an error instead.
    pub fn reserve(&self, key: &str) -> RateLimitResult<Duration> {
        let now = Instant::now();

        let global_wait = {
            let mut global = self.global_reset.lock();
            match *global {
                Some(reset_at) if reset_at > now => reset_at - now,
                Some(_) => {
                    *global = None;
                    Duration::ZERO
                }
                None => Duration::ZERO,
            }
        };

        let wait = if global_wait.is_zero() {
            self.buckets
                .entry(key.to_string())
                .or_insert_with(|| Bucket::new(key))
                .reserve(now)
        } else {
            global_wait
        };

        if !wait.is_zero() && self.cancel_on_rate_limit {
            return Err(RateLimitError::RateLimited {
                key: key.to_string(),
                retry_after: wait,
            });
        }
        Ok(wait)
    }

    /// Wait until a call under `key` may go out
    pub async fn acquire(&self, key: &str) -> RateLimitResult<()> {
        loop {
            let wait = self.reserve(key)?;
            if wait.is_zero() {
                return Ok(());
            }
            debug!(key = %key, wait_ms = wait.as_millis() as u64, "Waiting for rate limit bucket");
            tokio::time::sleep(wait).await;
        }
    }

    /// Re-derive bucket state from response headers
    pub fn update_from_response(
        &self,
        key: &str,
        remaining: u32,
        reset_at: Instant,
        limit: Option<u32>,
    ) {
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(key))
            .update(remaining, reset_at, limit);
    }

    /// Record a 429 for `key`, or for every key when `global`
    pub fn rate_limited(&self, key: &str, retry_after: Duration, global: bool) {
        let reset_at = Instant::now() + retry_after;
        if global {
            warn!(retry_after_ms = retry_after.as_millis() as u64, "Global rate limit hit");
            let mut current = self.global_reset.lock();
            if current.map_or(true, |at| at < reset_at) {
                *current = Some(reset_at);
            }
        } else {
            warn!(key = %key, retry_after_ms = retry_after.as_millis() as u64, "Rate limit hit");
            self.buckets
                .entry(key.to_string())
                .or_insert_with(|| Bucket::new(key))
                .exhaust(reset_at);
        }
    }

    /// Snapshot of the bucket under `key`
    pub fn bucket(&self, key: &str) -> Option<Bucket> {
        self.buckets.get(key).map(|b| b.clone())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
