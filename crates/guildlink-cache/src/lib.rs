//! # guildlink-cache
//!
//! In-memory entity cache fed by gateway events.
//!
//! ## Features
//!
//! - **LFU maps**: users, channels, guilds and voice states each live in their
//!   own bounded map with least-frequently-used eviction
//! - **Merge policies**: per-event rules that tolerate out-of-order delivery
//! - **Read-through hooks**: getters and setters used by REST fallbacks
//!
//! ## Example
//!
//! ```ignore
//! use guildlink_cache::Cache;
//! use guildlink_common::CacheConfig;
//! use guildlink_core::EventName;
//!
//! let cache = Cache::new(CacheConfig::default());
//! let event = cache.apply(EventName::GuildCreate, raw)?;
//! let guild = cache.guild(guild_id);
//! ```

pub mod cache;
pub mod error;
pub mod lfu;

pub use cache::{Cache, CacheStats};
pub use error::{CacheError, CacheResult};
pub use lfu::LfuMap;
