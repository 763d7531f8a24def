//! # guildlink-core
//!
//! Model layer: entities mirrored from the platform, value objects, dispatch
//! event payloads and the JSON merge used to apply partial updates.
//! This crate has no dependencies on networking or runtime crates.

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Activity, Attachment, Channel, ChannelType, Emoji, Guild, Member, Message, OverwriteKind,
    PermissionOverwrite, Presence, PresenceUser, Role, User, VoiceState,
};
pub use error::{ModelError, ModelResult};
pub use events::{EventName, GatewayEvent};
pub use traits::{Patch, merge_json};
pub use value_objects::{Permissions, Snowflake, SnowflakeParseError};
