//! # guildlink
//!
//! Sharded gateway client. A [`Client`] authenticates through REST, opens
//! one connection per shard, decodes every tracked dispatch through the
//! cache and hands it to the handlers registered with [`Client::on`].
//!
//! ```no_run
//! use guildlink::{Client, ClientConfig, EventName, GatewayEvent, Listener};
//!
//! # async fn example() -> Result<(), guildlink::ClientError> {
//! let client = Client::new(ClientConfig::new("token"))?;
//! client.on(
//!     EventName::MessageCreate,
//!     vec![Listener::handler(|_client, event| async move {
//!         if let GatewayEvent::MessageCreate(create) = &*event {
//!             println!("{}", create.message.content);
//!         }
//!         Ok(())
//!     })],
//! )?;
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod demux;
pub mod error;

pub use client::{Client, Lifecycle};
pub use demux::{ChannelError, Controller, Ctrl, EventDemultiplexer, Listener, RegistrationError};
pub use error::{ClientError, ClientResult};

pub use guildlink_cache::Cache;
pub use guildlink_common::{CacheConfig, ClientConfig, ShardConfig};
pub use guildlink_core::{EventName, GatewayEvent, Snowflake};
pub use guildlink_gateway::{ConnectionState, Intents, UpdateStatus};
