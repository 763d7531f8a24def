//! Shard connections
//!
//! A [`Connection`] drives one gateway session; the [`ShardManager`] owns
//! every shard of a client.

mod backoff;
mod connection;
mod manager;
mod session;

pub use backoff::ExponentialBackoff;
pub use connection::{
    command_bucket, Connection, ConnectionConfig, ConnectionState, Disconnect, COMMAND_LIMIT, COMMAND_WINDOW,
    IDENTIFY_BUCKET,
};
pub use manager::{shard_for_guild, ManagerConfig, ShardManager};
pub use session::ShardSession;
