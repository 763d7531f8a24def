//! Typed REST fetchers
//!
//! Thin wrappers pairing an endpoint with its rate limit key and response
//! type. They take any [`Requester`], so callers can pass a
//! [`crate::RestClient`] or a test double.

use crate::error::{HttpError, HttpResult};
use crate::request::Request;
use crate::requester::Requester;
use crate::routes::{self, key};
use guildlink_core::{Channel, Guild, Member, Role, Snowflake, User};
use serde::{Deserialize, Serialize};

/// Largest page `guild_members` accepts
pub const MAX_MEMBERS_PAGE: u32 = 1000;

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayBot {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    #[serde(default)]
    pub session_start_limit: SessionStartLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until the limit resets
    pub reset_after: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

fn ensure_id(id: Snowflake, what: &str) -> HttpResult<()> {
    if id.is_zero() {
        return Err(HttpError::InvalidArgument(format!("{what} id must not be zero")));
    }
    Ok(())
}

pub async fn current_user<R: Requester + ?Sized>(rest: &R) -> HttpResult<User> {
    rest.get(Request::new(key::CURRENT_USER, routes::CURRENT_USER))
        .await?
        .json()
}

pub async fn gateway_bot<R: Requester + ?Sized>(rest: &R) -> HttpResult<GatewayBot> {
    rest.get(Request::new(key::GATEWAY, routes::GATEWAY_BOT))
        .await?
        .json()
}

pub async fn guild<R: Requester + ?Sized>(rest: &R, guild_id: Snowflake) -> HttpResult<Guild> {
    ensure_id(guild_id, "guild")?;
    rest.get(Request::new(key::guild(guild_id), routes::guild(guild_id)))
        .await?
        .json()
}

pub async fn guild_member<R: Requester + ?Sized>(
    rest: &R,
    guild_id: Snowflake,
    user_id: Snowflake,
) -> HttpResult<Member> {
    ensure_id(guild_id, "guild")?;
    ensure_id(user_id, "user")?;
    let mut member: Member = rest
        .get(Request::new(
            key::guild_members(guild_id),
            routes::guild_member(guild_id, user_id),
        ))
        .await?
        .json()?;
    member.guild_id = Some(guild_id);
    Ok(member)
}

/// One page of members, ordered by user id, starting after `after`
pub async fn guild_members<R: Requester + ?Sized>(
    rest: &R,
    guild_id: Snowflake,
    after: Option<Snowflake>,
    limit: u32,
) -> HttpResult<Vec<Member>> {
    ensure_id(guild_id, "guild")?;
    if limit == 0 || limit > MAX_MEMBERS_PAGE {
        return Err(HttpError::InvalidArgument(format!(
            "member page limit must be within 1..={MAX_MEMBERS_PAGE}, got {limit}"
        )));
    }

    let mut endpoint = format!("{}?limit={limit}", routes::guild_members(guild_id));
    if let Some(after) = after {
        endpoint.push_str(&format!("&after={after}"));
    }
    let mut members: Vec<Member> = rest
        .get(Request::new(key::guild_members(guild_id), endpoint))
        .await?
        .json()?;
    for member in &mut members {
        member.guild_id = Some(guild_id);
    }
    Ok(members)
}

pub async fn guild_roles<R: Requester + ?Sized>(
    rest: &R,
    guild_id: Snowflake,
) -> HttpResult<Vec<Role>> {
    ensure_id(guild_id, "guild")?;
    rest.get(Request::new(key::guild_roles(guild_id), routes::guild_roles(guild_id)))
        .await?
        .json()
}

pub async fn guild_channels<R: Requester + ?Sized>(
    rest: &R,
    guild_id: Snowflake,
) -> HttpResult<Vec<Channel>> {
    ensure_id(guild_id, "guild")?;
    rest.get(Request::new(
        key::guild_channels(guild_id),
        routes::guild_channels(guild_id),
    ))
    .await?
    .json()
}

pub async fn channel<R: Requester + ?Sized>(
    rest: &R,
    channel_id: Snowflake,
) -> HttpResult<Channel> {
    ensure_id(channel_id, "channel")?;
    rest.get(Request::new(key::channel(channel_id), routes::channel(channel_id)))
        .await?
        .json()
}

pub async fn user<R: Requester + ?Sized>(rest: &R, user_id: Snowflake) -> HttpResult<User> {
    ensure_id(user_id, "user")?;
    rest.get(Request::new(key::user(user_id), routes::user(user_id)))
        .await?
        .json()
}
