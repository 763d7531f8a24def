//! Endpoints and their rate limit keys
//!
//! Keys group endpoints that share a server-side bucket: every call under
//! one guild shares `g:{id}`, its member list `g:{id}:m`, and so on.

use guildlink_core::Snowflake;

pub mod key {
    use super::Snowflake;

    pub const GATEWAY: &str = "gateway";
    pub const CURRENT_USER: &str = "u:@me";

    pub fn guild(id: Snowflake) -> String {
        format!("g:{id}")
    }

    pub fn guild_channels(id: Snowflake) -> String {
        format!("g:{id}:c")
    }

    pub fn guild_members(id: Snowflake) -> String {
        format!("g:{id}:m")
    }

    pub fn guild_roles(id: Snowflake) -> String {
        format!("g:{id}:r")
    }

    pub fn channel(id: Snowflake) -> String {
        format!("c:{id}")
    }

    pub fn channel_messages(id: Snowflake) -> String {
        format!("c:{id}:m")
    }

    pub fn user(id: Snowflake) -> String {
        format!("u:{id}")
    }
}

pub const GATEWAY_BOT: &str = "/gateway/bot";
pub const CURRENT_USER: &str = "/users/@me";

pub fn guild(id: Snowflake) -> String {
    format!("/guilds/{id}")
}

pub fn guild_channels(id: Snowflake) -> String {
    format!("/guilds/{id}/channels")
}

pub fn guild_members(id: Snowflake) -> String {
    format!("/guilds/{id}/members")
}

pub fn guild_member(guild_id: Snowflake, user_id: Snowflake) -> String {
    format!("/guilds/{guild_id}/members/{user_id}")
}

pub fn guild_roles(id: Snowflake) -> String {
    format!("/guilds/{id}/roles")
}

pub fn channel(id: Snowflake) -> String {
    format!("/channels/{id}")
}

pub fn channel_messages(id: Snowflake) -> String {
    format!("/channels/{id}/messages")
}

pub fn user(id: Snowflake) -> String {
    format!("/users/{id}")
}
