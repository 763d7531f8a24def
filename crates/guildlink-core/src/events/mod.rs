//! Gateway dispatch events

mod names;
pub mod payloads;

pub use names::EventName;
pub use payloads::*;

use crate::error::ModelResult;
use crate::value_objects::Snowflake;

/// A decoded dispatch event
///
/// One variant per [`EventName`]; the payload is what handlers receive.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Ready(Ready),
    Resumed(Resumed),
    ChannelCreate(ChannelCreate),
    ChannelUpdate(ChannelUpdate),
    ChannelDelete(ChannelDelete),
    ChannelPinsUpdate(ChannelPinsUpdate),
    GuildCreate(GuildCreate),
    GuildUpdate(GuildUpdate),
    GuildDelete(GuildDelete),
    GuildBanAdd(GuildBanAdd),
    GuildBanRemove(GuildBanRemove),
    GuildEmojisUpdate(GuildEmojisUpdate),
    GuildIntegrationsUpdate(GuildIntegrationsUpdate),
    GuildMemberAdd(GuildMemberAdd),
    GuildMemberRemove(GuildMemberRemove),
    GuildMemberUpdate(GuildMemberUpdate),
    GuildMembersChunk(GuildMembersChunk),
    GuildRoleCreate(GuildRoleCreate),
    GuildRoleUpdate(GuildRoleUpdate),
    GuildRoleDelete(GuildRoleDelete),
    MessageCreate(MessageCreate),
    MessageUpdate(MessageUpdate),
    MessageDelete(MessageDelete),
    MessageDeleteBulk(MessageDeleteBulk),
    MessageReactionAdd(MessageReactionAdd),
    MessageReactionRemove(MessageReactionRemove),
    MessageReactionRemoveAll(MessageReactionRemoveAll),
    PresenceUpdate(PresenceUpdate),
    PresencesReplace(PresencesReplace),
    TypingStart(TypingStart),
    UserUpdate(UserUpdate),
    VoiceStateUpdate(VoiceStateUpdate),
    VoiceServerUpdate(VoiceServerUpdate),
    WebhooksUpdate(WebhooksUpdate),
}

impl GatewayEvent {
    /// Decode a raw dispatch payload for the given event
    pub fn decode(name: EventName, raw: &[u8]) -> ModelResult<Self> {
        use serde_json::from_slice as de;

        let event = match name {
            EventName::Ready => Self::Ready(de(raw)?),
            EventName::Resumed => Self::Resumed(de(raw)?),
            EventName::ChannelCreate => Self::ChannelCreate(de(raw)?),
            EventName::ChannelUpdate => Self::ChannelUpdate(de(raw)?),
            EventName::ChannelDelete => Self::ChannelDelete(de(raw)?),
            EventName::ChannelPinsUpdate => Self::ChannelPinsUpdate(de(raw)?),
            EventName::GuildCreate => Self::GuildCreate(de(raw)?),
            EventName::GuildUpdate => Self::GuildUpdate(de(raw)?),
            EventName::GuildDelete => Self::GuildDelete(de(raw)?),
            EventName::GuildBanAdd => Self::GuildBanAdd(de(raw)?),
            EventName::GuildBanRemove => Self::GuildBanRemove(de(raw)?),
            EventName::GuildEmojisUpdate => Self::GuildEmojisUpdate(de(raw)?),
            EventName::GuildIntegrationsUpdate => Self::GuildIntegrationsUpdate(de(raw)?),
            EventName::GuildMemberAdd => Self::GuildMemberAdd(de(raw)?),
            EventName::GuildMemberRemove => Self::GuildMemberRemove(de(raw)?),
            EventName::GuildMemberUpdate => Self::GuildMemberUpdate(de(raw)?),
            EventName::GuildMembersChunk => Self::GuildMembersChunk(de(raw)?),
            EventName::GuildRoleCreate => Self::GuildRoleCreate(de(raw)?),
            EventName::GuildRoleUpdate => Self::GuildRoleUpdate(de(raw)?),
            EventName::GuildRoleDelete => Self::GuildRoleDelete(de(raw)?),
            EventName::MessageCreate => Self::MessageCreate(de(raw)?),
            EventName::MessageUpdate => Self::MessageUpdate(de(raw)?),
            EventName::MessageDelete => Self::MessageDelete(de(raw)?),
            EventName::MessageDeleteBulk => Self::MessageDeleteBulk(de(raw)?),
            EventName::MessageReactionAdd => Self::MessageReactionAdd(de(raw)?),
            EventName::MessageReactionRemove => Self::MessageReactionRemove(de(raw)?),
            EventName::MessageReactionRemoveAll => Self::MessageReactionRemoveAll(de(raw)?),
            EventName::PresenceUpdate => Self::PresenceUpdate(de(raw)?),
            EventName::PresencesReplace => Self::PresencesReplace(de(raw)?),
            EventName::TypingStart => Self::TypingStart(de(raw)?),
            EventName::UserUpdate => Self::UserUpdate(de(raw)?),
            EventName::VoiceStateUpdate => Self::VoiceStateUpdate(de(raw)?),
            EventName::VoiceServerUpdate => Self::VoiceServerUpdate(de(raw)?),
            EventName::WebhooksUpdate => Self::WebhooksUpdate(de(raw)?),
        };
        Ok(event)
    }

    /// Name of the event this payload belongs to
    pub fn name(&self) -> EventName {
        match self {
            Self::Ready(_) => EventName::Ready,
            Self::Resumed(_) => EventName::Resumed,
            Self::ChannelCreate(_) => EventName::ChannelCreate,
            Self::ChannelUpdate(_) => EventName::ChannelUpdate,
            Self::ChannelDelete(_) => EventName::ChannelDelete,
            Self::ChannelPinsUpdate(_) => EventName::ChannelPinsUpdate,
            Self::GuildCreate(_) => EventName::GuildCreate,
            Self::GuildUpdate(_) => EventName::GuildUpdate,
            Self::GuildDelete(_) => EventName::GuildDelete,
            Self::GuildBanAdd(_) => EventName::GuildBanAdd,
            Self::GuildBanRemove(_) => EventName::GuildBanRemove,
            Self::GuildEmojisUpdate(_) => EventName::GuildEmojisUpdate,
            Self::GuildIntegrationsUpdate(_) => EventName::GuildIntegrationsUpdate,
            Self::GuildMemberAdd(_) => EventName::GuildMemberAdd,
            Self::GuildMemberRemove(_) => EventName::GuildMemberRemove,
            Self::GuildMemberUpdate(_) => EventName::GuildMemberUpdate,
            Self::GuildMembersChunk(_) => EventName::GuildMembersChunk,
            Self::GuildRoleCreate(_) => EventName::GuildRoleCreate,
            Self::GuildRoleUpdate(_) => EventName::GuildRoleUpdate,
            Self::GuildRoleDelete(_) => EventName::GuildRoleDelete,
            Self::MessageCreate(_) => EventName::MessageCreate,
            Self::MessageUpdate(_) => EventName::MessageUpdate,
            Self::MessageDelete(_) => EventName::MessageDelete,
            Self::MessageDeleteBulk(_) => EventName::MessageDeleteBulk,
            Self::MessageReactionAdd(_) => EventName::MessageReactionAdd,
            Self::MessageReactionRemove(_) => EventName::MessageReactionRemove,
            Self::MessageReactionRemoveAll(_) => EventName::MessageReactionRemoveAll,
            Self::PresenceUpdate(_) => EventName::PresenceUpdate,
            Self::PresencesReplace(_) => EventName::PresencesReplace,
            Self::TypingStart(_) => EventName::TypingStart,
            Self::UserUpdate(_) => EventName::UserUpdate,
            Self::VoiceStateUpdate(_) => EventName::VoiceStateUpdate,
            Self::VoiceServerUpdate(_) => EventName::VoiceServerUpdate,
            Self::WebhooksUpdate(_) => EventName::WebhooksUpdate,
        }
    }

    /// Guild the event belongs to, when it carries one
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::Ready(_) | Self::Resumed(_) | Self::UserUpdate(_) | Self::PresencesReplace(_) => {
                None
            }
            Self::ChannelCreate(e) => e.channel.guild_id,
            Self::ChannelUpdate(e) => e.channel.guild_id,
            Self::ChannelDelete(e) => e.channel.guild_id,
            Self::ChannelPinsUpdate(e) => e.guild_id,
            Self::GuildCreate(e) => Some(e.guild.id),
            Self::GuildUpdate(e) => Some(e.guild.id),
            Self::GuildDelete(e) => Some(e.guild.id),
            Self::GuildBanAdd(e) => Some(e.guild_id),
            Self::GuildBanRemove(e) => Some(e.guild_id),
            Self::GuildEmojisUpdate(e) => Some(e.guild_id),
            Self::GuildIntegrationsUpdate(e) => Some(e.guild_id),
            Self::GuildMemberAdd(e) => e.member.guild_id,
            Self::GuildMemberRemove(e) => Some(e.guild_id),
            Self::GuildMemberUpdate(e) => e.member.guild_id,
            Self::GuildMembersChunk(e) => Some(e.guild_id),
            Self::GuildRoleCreate(e) => Some(e.guild_id),
            Self::GuildRoleUpdate(e) => Some(e.guild_id),
            Self::GuildRoleDelete(e) => Some(e.guild_id),
            Self::MessageCreate(e) => e.message.guild_id,
            Self::MessageUpdate(e) => e.message.guild_id,
            Self::MessageDelete(e) => e.guild_id,
            Self::MessageDeleteBulk(e) => e.guild_id,
            Self::MessageReactionAdd(e) => e.guild_id,
            Self::MessageReactionRemove(e) => e.guild_id,
            Self::MessageReactionRemoveAll(e) => e.guild_id,
            Self::PresenceUpdate(e) => e.presence.guild_id,
            Self::TypingStart(e) => e.guild_id,
            Self::VoiceStateUpdate(e) => e.state.guild_id,
            Self::VoiceServerUpdate(e) => Some(e.guild_id),
            Self::WebhooksUpdate(e) => Some(e.guild_id),
        }
    }
}
