//! Entities mirrored from the remote platform

mod channel;
mod emoji;
mod guild;
mod member;
mod message;
mod presence;
mod role;
mod user;
mod voice_state;

pub use channel::{Channel, ChannelType, OverwriteKind, PermissionOverwrite};
pub use emoji::Emoji;
pub use guild::Guild;
pub use member::Member;
pub use message::{Attachment, Message};
pub use presence::{Activity, Presence, PresenceUser};
pub use role::Role;
pub use user::User;
pub use voice_state::VoiceState;
