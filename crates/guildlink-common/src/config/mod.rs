//! Configuration structs

mod client_config;

pub use client_config::{CacheConfig, ClientConfig, ConfigError, ShardConfig};
