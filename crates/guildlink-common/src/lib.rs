//! # guildlink-common
//!
//! Shared utilities: client configuration, the error taxonomy, rate limiting
//! and telemetry setup.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{CacheConfig, ClientConfig, ConfigError, ShardConfig};
pub use error::ErrorKind;
pub use ratelimit::{Bucket, RateLimitError, RateLimitResult, RateLimiter};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
