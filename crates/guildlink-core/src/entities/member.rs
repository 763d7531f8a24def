//! Member entity - a user's membership in a guild

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::User;
use crate::value_objects::Snowflake;

/// Guild member
///
/// `user_id` is always populated: payloads only carry the embedded `user`
/// object, so decoding lifts its id. Members stored inside a cached guild drop
/// the embedded user; user data lives in the user cache keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "MemberWire")]
pub struct Member {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    pub roles: Vec<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_since: Option<DateTime<Utc>>,
    pub deaf: bool,
    pub mute: bool,
    pub pending: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MemberWire {
    guild_id: Option<Snowflake>,
    user_id: Snowflake,
    user: Option<User>,
    nick: Option<String>,
    roles: Vec<Snowflake>,
    joined_at: Option<DateTime<Utc>>,
    premium_since: Option<DateTime<Utc>>,
    deaf: bool,
    mute: bool,
    pending: bool,
}

impl From<MemberWire> for Member {
    fn from(wire: MemberWire) -> Self {
        let user_id = match &wire.user {
            Some(user) if wire.user_id.is_zero() => user.id,
            _ => wire.user_id,
        };
        Self {
            guild_id: wire.guild_id,
            user_id,
            user: wire.user,
            nick: wire.nick,
            roles: wire.roles,
            joined_at: wire.joined_at,
            premium_since: wire.premium_since,
            deaf: wire.deaf,
            mute: wire.mute,
            pending: wire.pending,
        }
    }
}

impl Member {
    /// Create a member for a user with no roles
    pub fn new(guild_id: Snowflake, user: User) -> Self {
        Self {
            guild_id: Some(guild_id),
            user_id: user.id,
            user: Some(user),
            ..Self::default()
        }
    }

    /// Nickname if set, otherwise the embedded user's display name
    pub fn display_name(&self) -> Option<&str> {
        self.nick
            .as_deref()
            .or_else(|| self.user.as_ref().map(User::display_name))
    }

    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }

    /// Copy without the embedded user, the form kept inside cached guilds
    pub fn without_user(&self) -> Self {
        Self {
            user: None,
            ..self.clone()
        }
    }
}
