//! Bucket based rate limiting
//!
//! Key naming used across the crates:
//! - REST: the route with its major parameter, e.g. `guilds:{id}:members`
//! - gateway commands: `ws:{shard_id}:commands`
//! - identify: `ws:identify`

mod bucket;
mod limiter;

pub use bucket::Bucket;
pub use limiter::{RateLimitError, RateLimitResult, RateLimiter};
