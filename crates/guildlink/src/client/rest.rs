//! Cache read-through
//!
//! Each getter answers from the cache when it can, otherwise asks the REST
//! API and stores what came back.

use super::Client;
use crate::error::ClientResult;
use guildlink_core::{Channel, Guild, Member, Role, Snowflake, User};
use guildlink_http::resources;
use tracing::trace;

impl Client {
    pub async fn get_current_user(&self) -> ClientResult<User> {
        if let Some(user) = self.inner.cache.current_user() {
            return Ok(user);
        }
        let user = resources::current_user(self.inner.rest.as_ref()).await?;
        self.inner.cache.set_current_user(user.clone());
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Snowflake) -> ClientResult<User> {
        if let Some(user) = self.inner.cache.user(user_id) {
            trace!(%user_id, "User cache hit");
            return Ok(user);
        }
        let user = resources::user(self.inner.rest.as_ref(), user_id).await?;
        self.inner.cache.set_user(user.clone());
        Ok(user)
    }

    pub async fn get_channel(&self, channel_id: Snowflake) -> ClientResult<Channel> {
        if let Some(channel) = self.inner.cache.channel(channel_id) {
            trace!(%channel_id, "Channel cache hit");
            return Ok(channel);
        }
        let channel = resources::channel(self.inner.rest.as_ref(), channel_id).await?;
        self.inner.cache.set_channel(channel.clone());
        Ok(channel)
    }

    /// Guild from the cache, or from REST when missing or unavailable
    pub async fn get_guild(&self, guild_id: Snowflake) -> ClientResult<Guild> {
        if let Some(guild) = self.inner.cache.guild(guild_id) {
            trace!(%guild_id, "Guild cache hit");
            return Ok(guild);
        }
        let guild = resources::guild(self.inner.rest.as_ref(), guild_id).await?;
        self.inner.cache.set_guild(guild.clone());
        Ok(guild)
    }

    pub async fn get_guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> ClientResult<Member> {
        if let Some(member) = self.inner.cache.guild_member(guild_id, user_id) {
            return Ok(member);
        }
        let member = resources::guild_member(self.inner.rest.as_ref(), guild_id, user_id).await?;
        self.inner.cache.set_guild_member(guild_id, member.clone());
        Ok(member)
    }

    /// One page of members straight from REST; the cache is only written
    pub async fn get_guild_members(
        &self,
        guild_id: Snowflake,
        after: Option<Snowflake>,
        limit: u32,
    ) -> ClientResult<Vec<Member>> {
        let members =
            resources::guild_members(self.inner.rest.as_ref(), guild_id, after, limit).await?;
        self.inner.cache.set_guild_members(guild_id, members.clone());
        Ok(members)
    }

    pub async fn get_guild_roles(&self, guild_id: Snowflake) -> ClientResult<Vec<Role>> {
        if let Some(roles) = self.inner.cache.guild_roles(guild_id) {
            return Ok(roles);
        }
        let roles = resources::guild_roles(self.inner.rest.as_ref(), guild_id).await?;
        self.inner.cache.set_guild_roles(guild_id, roles.clone());
        Ok(roles)
    }

    pub async fn get_guild_channels(&self, guild_id: Snowflake) -> ClientResult<Vec<Channel>> {
        if let Some(channels) = self.inner.cache.guild_channels(guild_id) {
            return Ok(channels);
        }
        let channels = resources::guild_channels(self.inner.rest.as_ref(), guild_id).await?;
        self.inner.cache.set_guild_channels(guild_id, channels.clone());
        Ok(channels)
    }
}
