//! Guild entity - a community with roles, members and channels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Channel, Emoji, Member, Role, VoiceState};
use crate::value_objects::{Permissions, Snowflake};

/// Guild entity
///
/// Roles, members and channels are owned by value. Their `guild_id` fields
/// are plain ids, never references back into the guild.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afk_channel_id: Option<Snowflake>,
    pub afk_timeout: u32,
    pub verification_level: u8,
    pub roles: Vec<Role>,
    pub emojis: Vec<Emoji>,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    pub large: bool,
    pub unavailable: bool,
    pub member_count: u64,
    pub voice_states: Vec<VoiceState>,
    pub members: Vec<Member>,
    pub channels: Vec<Channel>,
}

impl Guild {
    /// Placeholder for a guild known only by id (outage or not yet loaded)
    pub fn unavailable(id: Snowflake) -> Self {
        Self {
            id,
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn member(&self, user_id: Snowflake) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn member_mut(&mut self, user_id: Snowflake) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.user_id == user_id)
    }

    pub fn role(&self, role_id: Snowflake) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }

    pub fn channel(&self, channel_id: Snowflake) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    pub fn channel_mut(&mut self, channel_id: Snowflake) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == channel_id)
    }

    /// Replace the channel with the same id, or append it
    pub fn upsert_channel(&mut self, mut channel: Channel) {
        channel.guild_id = Some(self.id);
        match self.channel_mut(channel.id) {
            Some(existing) => *existing = channel,
            None => self.channels.push(channel),
        }
    }

    pub fn remove_channel(&mut self, channel_id: Snowflake) -> Option<Channel> {
        let index = self.channels.iter().position(|c| c.id == channel_id)?;
        Some(self.channels.remove(index))
    }

    /// Insert the member if no member with that user id exists
    ///
    /// Returns `true` on a real insert; `member_count` only moves then.
    pub fn add_member(&mut self, member: Member) -> bool {
        if self.member(member.user_id).is_some() {
            return false;
        }
        self.members.push(member);
        self.member_count += 1;
        true
    }

    /// Replace the member with the same user id, or append it
    ///
    /// Unlike [`Guild::add_member`] this never touches `member_count`; it is
    /// used for member lists that describe existing members.
    pub fn upsert_member(&mut self, mut member: Member) {
        member.guild_id = Some(self.id);
        match self.member_mut(member.user_id) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }

    /// Swap-remove the member with the given user id
    ///
    /// Returns `false` and leaves the guild untouched when absent.
    pub fn remove_member(&mut self, user_id: Snowflake) -> bool {
        match self.members.iter().position(|m| m.user_id == user_id) {
            Some(index) => {
                self.members.swap_remove(index);
                self.member_count = self.member_count.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Replace the role with the same id, or append it
    pub fn upsert_role(&mut self, mut role: Role) {
        role.guild_id = Some(self.id);
        match self.roles.iter_mut().find(|r| r.id == role.id) {
            Some(existing) => *existing = role,
            None => self.roles.push(role),
        }
    }

    pub fn remove_role(&mut self, role_id: Snowflake) -> Option<Role> {
        let index = self.roles.iter().position(|r| r.id == role_id)?;
        Some(self.roles.remove(index))
    }

    /// Guild-level permissions of a member, resolved through the role list
    ///
    /// Channel overwrites are not applied.
    pub fn member_permissions(&self, user_id: Snowflake) -> Option<Permissions> {
        if self.owner_id == Some(user_id) {
            return Some(Permissions::all());
        }
        let member = self.member(user_id)?;
        let everyone = self.role(self.id).map(|r| r.permissions).unwrap_or_default();
        let granted = Permissions::combine(
            member
                .roles
                .iter()
                .filter_map(|id| self.role(*id))
                .map(|r| r.permissions),
        ) | everyone;

        if granted.contains(Permissions::ADMINISTRATOR) {
            Some(Permissions::all())
        } else {
            Some(granted)
        }
    }
}
