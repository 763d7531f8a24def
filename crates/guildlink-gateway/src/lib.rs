//! # guildlink-gateway
//!
//! Gateway side of the client: wire protocol types, the command allow-list,
//! the per-shard connection state machine and the shard manager.

pub mod command;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;

pub use command::Command;
pub use connection::{
    shard_for_guild, Connection, ConnectionConfig, ConnectionState, Disconnect, ManagerConfig,
    ShardManager, ShardSession,
};
pub use error::{GatewayError, GatewayResult};
pub use events::{EventEnvelope, TrackedEvents, ALWAYS_TRACKED};
pub use protocol::{CloseCode, GatewayMessage, Intents, OpCode, UpdateStatus};
