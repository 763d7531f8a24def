//! Event-driven entity cache
//!
//! Each gateway event that affects cached state has an `apply_*` function:
//! it decodes the raw payload, takes the lock of the entity kind it touches,
//! merges, releases, and hands back the decoded event. Locks are taken one
//! kind at a time and never held across each other.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use guildlink_common::CacheConfig;
use guildlink_core::events::{
    ChannelCreate, ChannelDelete, ChannelPinsUpdate, ChannelUpdate, GuildCreate, GuildDelete,
    GuildEmojisUpdate, GuildMemberAdd, GuildMemberRemove, GuildMemberUpdate, GuildMembersChunk,
    GuildRoleCreate, GuildRoleDelete, GuildRoleUpdate, GuildUpdate, Ready, UserUpdate,
    VoiceStateUpdate,
};
use guildlink_core::{
    Channel, EventName, GatewayEvent, Guild, Member, ModelResult, Patch, Role, Snowflake, User,
    VoiceState,
};

use crate::error::{CacheError, CacheResult};
use crate::lfu::LfuMap;

/// Voice states are keyed by (guild, user)
type VoiceKey = (Snowflake, Snowflake);

/// Entry counts per entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub users: usize,
    pub channels: usize,
    pub guilds: usize,
    pub voice_states: usize,
}

/// Data pulled out of a guild payload into the other entity maps
#[derive(Default)]
struct Lifted {
    users: Vec<User>,
    channels: Vec<Channel>,
    voice_states: Vec<VoiceState>,
}

/// In-memory cache of users, channels, guilds and voice states
pub struct Cache {
    config: CacheConfig,
    current_user: Mutex<Option<User>>,
    users: Mutex<LfuMap<Snowflake, User>>,
    channels: Mutex<LfuMap<Snowflake, Channel>>,
    guilds: Mutex<LfuMap<Snowflake, Guild>>,
    voice_states: Mutex<LfuMap<VoiceKey, VoiceState>>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let config = if config.enabled {
            config
        } else {
            CacheConfig::disabled()
        };

        Self {
            current_user: Mutex::new(None),
            users: Mutex::new(LfuMap::new(config.limit_users)),
            channels: Mutex::new(LfuMap::new(config.limit_channels)),
            guilds: Mutex::new(LfuMap::new(config.limit_guilds)),
            voice_states: Mutex::new(LfuMap::new(config.limit_voice_states)),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Events that keep the enabled entity kinds current
    pub fn tracked_events(&self) -> Vec<EventName> {
        let mut events = Vec::new();
        if !self.config.enabled {
            return events;
        }
        if self.config.limit_users > 0 {
            events.extend([EventName::Ready, EventName::UserUpdate]);
        }
        if self.config.limit_channels > 0 {
            events.extend([
                EventName::ChannelCreate,
                EventName::ChannelUpdate,
                EventName::ChannelPinsUpdate,
                EventName::ChannelDelete,
            ]);
        }
        if self.config.limit_guilds > 0 {
            events.extend([
                EventName::GuildCreate,
                EventName::GuildDelete,
                EventName::GuildUpdate,
                EventName::GuildEmojisUpdate,
                EventName::GuildMemberAdd,
                EventName::GuildMemberRemove,
                EventName::GuildMembersChunk,
                EventName::GuildMemberUpdate,
                EventName::GuildRoleCreate,
                EventName::GuildRoleDelete,
                EventName::GuildRoleUpdate,
                EventName::GuildIntegrationsUpdate,
            ]);
        }
        if self.config.limit_voice_states > 0 {
            events.push(EventName::VoiceStateUpdate);
        }
        events
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            users: self.users.lock().len(),
            channels: self.channels.lock().len(),
            guilds: self.guilds.lock().len(),
            voice_states: self.voice_states.lock().len(),
        }
    }

    /// Drop everything, including the current user
    pub fn clear(&self) {
        *self.current_user.lock() = None;
        self.users.lock().clear();
        self.channels.lock().clear();
        self.guilds.lock().clear();
        self.voice_states.lock().clear();
    }

    /// Apply a dispatch payload and return the decoded event
    ///
    /// Events without a cache policy are only decoded.
    pub fn apply(&self, name: EventName, raw: &[u8]) -> CacheResult<GatewayEvent> {
        trace!(event = %name, bytes = raw.len(), "Applying event to cache");

        let event = match name {
            EventName::Ready => GatewayEvent::Ready(self.apply_ready(raw)?),
            EventName::UserUpdate => GatewayEvent::UserUpdate(self.apply_user_update(raw)?),
            EventName::ChannelCreate => GatewayEvent::ChannelCreate(self.apply_channel_create(raw)?),
            EventName::ChannelUpdate => GatewayEvent::ChannelUpdate(self.apply_channel_update(raw)?),
            EventName::ChannelDelete => GatewayEvent::ChannelDelete(self.apply_channel_delete(raw)?),
            EventName::ChannelPinsUpdate => {
                GatewayEvent::ChannelPinsUpdate(self.apply_channel_pins_update(raw)?)
            }
            EventName::GuildCreate => GatewayEvent::GuildCreate(self.apply_guild_create(raw)?),
            EventName::GuildUpdate => GatewayEvent::GuildUpdate(self.apply_guild_update(raw)?),
            EventName::GuildDelete => GatewayEvent::GuildDelete(self.apply_guild_delete(raw)?),
            EventName::GuildEmojisUpdate => {
                GatewayEvent::GuildEmojisUpdate(self.apply_guild_emojis_update(raw)?)
            }
            EventName::GuildMemberAdd => {
                GatewayEvent::GuildMemberAdd(self.apply_guild_member_add(raw)?)
            }
            EventName::GuildMemberRemove => {
                GatewayEvent::GuildMemberRemove(self.apply_guild_member_remove(raw)?)
            }
            EventName::GuildMemberUpdate => {
                GatewayEvent::GuildMemberUpdate(self.apply_guild_member_update(raw)?)
            }
            EventName::GuildMembersChunk => {
                GatewayEvent::GuildMembersChunk(self.apply_guild_members_chunk(raw)?)
            }
            EventName::GuildRoleCreate => {
                GatewayEvent::GuildRoleCreate(self.apply_guild_role_create(raw)?)
            }
            EventName::GuildRoleUpdate => {
                GatewayEvent::GuildRoleUpdate(self.apply_guild_role_update(raw)?)
            }
            EventName::GuildRoleDelete => {
                GatewayEvent::GuildRoleDelete(self.apply_guild_role_delete(raw)?)
            }
            EventName::VoiceStateUpdate => {
                GatewayEvent::VoiceStateUpdate(self.apply_voice_state_update(raw)?)
            }
            other => GatewayEvent::decode(other, raw).map_err(|e| CacheError::decode(other, e))?,
        };
        Ok(event)
    }

    // ==================== Users ====================

    pub fn apply_ready(&self, raw: &[u8]) -> CacheResult<Ready> {
        let ready: Ready = decode(EventName::Ready, raw)?;
        *self.current_user.lock() = Some(ready.user.clone());
        self.users.lock().insert(ready.user.id, ready.user.clone());
        // READY starts a fresh session; this shard's guilds come back as
        // GUILD_CREATE and must replace whatever the old session left behind.
        let mut guilds = self.guilds.lock();
        for guild in &ready.guilds {
            guilds.insert(guild.id, Guild::unavailable(guild.id));
        }
        Ok(ready)
    }

    pub fn apply_user_update(&self, raw: &[u8]) -> CacheResult<UserUpdate> {
        let event: UserUpdate = decode(EventName::UserUpdate, raw)?;
        {
            let mut current = self.current_user.lock();
            match current.as_mut() {
                Some(user) if user.id == event.user.id => {
                    log_merge(EventName::UserUpdate, user.patch_bytes(raw));
                }
                _ => *current = Some(event.user.clone()),
            }
        }
        if let Some(user) = self.users.lock().get_mut(&event.user.id) {
            log_merge(EventName::UserUpdate, user.patch_bytes(raw));
        }
        Ok(event)
    }

    // ==================== Channels ====================

    pub fn apply_channel_create(&self, raw: &[u8]) -> CacheResult<ChannelCreate> {
        let event: ChannelCreate = decode(EventName::ChannelCreate, raw)?;
        // A create may arrive after an update for the same channel; merge so
        // the newer fields survive.
        self.merge_channel(EventName::ChannelCreate, raw, &event.channel);
        Ok(event)
    }

    pub fn apply_channel_update(&self, raw: &[u8]) -> CacheResult<ChannelUpdate> {
        let event: ChannelUpdate = decode(EventName::ChannelUpdate, raw)?;
        self.merge_channel(EventName::ChannelUpdate, raw, &event.channel);
        Ok(event)
    }

    pub fn apply_channel_delete(&self, raw: &[u8]) -> CacheResult<ChannelDelete> {
        let event: ChannelDelete = decode(EventName::ChannelDelete, raw)?;
        let channel_id = event.channel.id;
        let removed = self.channels.lock().remove(&channel_id);

        let guild_id = event
            .channel
            .guild_id
            .or_else(|| removed.and_then(|c| c.guild_id));
        if let Some(guild_id) = guild_id {
            self.with_guild(guild_id, |guild| guild.remove_channel(channel_id));
        }
        Ok(event)
    }

    pub fn apply_channel_pins_update(&self, raw: &[u8]) -> CacheResult<ChannelPinsUpdate> {
        let event: ChannelPinsUpdate = decode(EventName::ChannelPinsUpdate, raw)?;
        // No timestamp means the last pin was removed; the cached value is kept
        let Some(timestamp) = event.last_pin_timestamp else {
            return Ok(event);
        };

        let guild_id = {
            let mut channels = self.channels.lock();
            channels.get_mut(&event.channel_id).and_then(|channel| {
                channel.last_pin_timestamp = Some(timestamp);
                channel.guild_id
            })
        };
        if let Some(guild_id) = event.guild_id.or(guild_id) {
            self.with_guild(guild_id, |guild| {
                if let Some(channel) = guild.channel_mut(event.channel_id) {
                    channel.last_pin_timestamp = Some(timestamp);
                }
            });
        }
        Ok(event)
    }

    fn merge_channel(&self, name: EventName, raw: &[u8], decoded: &Channel) {
        let stored = {
            let mut channels = self.channels.lock();
            if let Some(existing) = channels.get_mut(&decoded.id) {
                log_merge(name, existing.patch_bytes(raw));
                existing.clone()
            } else {
                channels.insert(decoded.id, decoded.clone());
                decoded.clone()
            }
        };

        if let Some(guild_id) = stored.guild_id {
            self.with_guild(guild_id, |guild| guild.upsert_channel(stored));
        }
    }

    // ==================== Guilds ====================

    pub fn apply_guild_create(&self, raw: &[u8]) -> CacheResult<GuildCreate> {
        let event: GuildCreate = decode(EventName::GuildCreate, raw)?;
        let mut guild = event.guild.clone();
        let lifted = normalize_guild(&mut guild);
        self.store_lifted(lifted);

        let mut guilds = self.guilds.lock();
        if let Some(existing) = guilds.get_mut(&guild.id) {
            if existing.unavailable {
                // Back from an outage
                *existing = guild;
            } else if !existing.members.is_empty() {
                // An update got here before the create; merge instead of
                // dropping either side.
                log_merge(EventName::GuildCreate, existing.patch_bytes(raw));
                normalize_guild(existing);
            } else {
                debug!(guild_id = %guild.id, "Ignoring duplicate guild create");
            }
        } else {
            guilds.insert(guild.id, guild);
        }
        Ok(event)
    }

    pub fn apply_guild_update(&self, raw: &[u8]) -> CacheResult<GuildUpdate> {
        let event: GuildUpdate = decode(EventName::GuildUpdate, raw)?;
        let mut guild = event.guild.clone();
        let lifted = normalize_guild(&mut guild);
        self.store_lifted(lifted);

        let mut guilds = self.guilds.lock();
        if let Some(existing) = guilds.get_mut(&guild.id) {
            if existing.unavailable {
                *existing = guild;
            } else {
                log_merge(EventName::GuildUpdate, existing.patch_bytes(raw));
                normalize_guild(existing);
            }
        } else {
            guilds.insert(guild.id, guild);
        }
        Ok(event)
    }

    pub fn apply_guild_delete(&self, raw: &[u8]) -> CacheResult<GuildDelete> {
        let event: GuildDelete = decode(EventName::GuildDelete, raw)?;
        let guild_id = event.guild.id;

        if event.guild.unavailable {
            // Outage: keep the slot, forget the contents
            if let Some(existing) = self.guilds.lock().get_mut(&guild_id) {
                *existing = Guild::unavailable(guild_id);
            }
            return Ok(event);
        }

        let removed = self.guilds.lock().remove(&guild_id);
        if let Some(guild) = removed {
            let mut channels = self.channels.lock();
            for channel in &guild.channels {
                channels.remove(&channel.id);
            }
        }
        self.voice_states
            .lock()
            .retain(|(voice_guild, _), _| *voice_guild != guild_id);
        Ok(event)
    }

    pub fn apply_guild_emojis_update(&self, raw: &[u8]) -> CacheResult<GuildEmojisUpdate> {
        let event: GuildEmojisUpdate = decode(EventName::GuildEmojisUpdate, raw)?;
        self.with_guild(event.guild_id, |guild| guild.emojis.clone_from(&event.emojis));
        Ok(event)
    }

    // ==================== Members ====================

    pub fn apply_guild_member_add(&self, raw: &[u8]) -> CacheResult<GuildMemberAdd> {
        let event: GuildMemberAdd = decode(EventName::GuildMemberAdd, raw)?;
        let member = &event.member;

        // Never clobber richer user data already cached
        if let Some(user) = &member.user {
            self.users.lock().insert_if_absent(user.id, user.clone());
        }

        if let Some(guild_id) = member.guild_id {
            self.with_guild(guild_id, |guild| {
                if let Some(existing) = guild.member_mut(member.user_id) {
                    log_merge(EventName::GuildMemberAdd, existing.patch_bytes(raw));
                    existing.user = None;
                } else {
                    guild.add_member(member.without_user());
                }
            });
        }
        Ok(event)
    }

    pub fn apply_guild_member_remove(&self, raw: &[u8]) -> CacheResult<GuildMemberRemove> {
        let event: GuildMemberRemove = decode(EventName::GuildMemberRemove, raw)?;
        self.with_guild(event.guild_id, |guild| guild.remove_member(event.user.id));
        Ok(event)
    }

    pub fn apply_guild_member_update(&self, raw: &[u8]) -> CacheResult<GuildMemberUpdate> {
        let event: GuildMemberUpdate = decode(EventName::GuildMemberUpdate, raw)?;
        let member = &event.member;

        if let Some(user) = &member.user {
            self.users.lock().insert(user.id, user.clone());
        }

        if let Some(guild_id) = member.guild_id {
            self.with_guild(guild_id, |guild| {
                if let Some(existing) = guild.member_mut(member.user_id) {
                    log_merge(EventName::GuildMemberUpdate, existing.patch_bytes(raw));
                    existing.user = None;
                }
            });
        }
        Ok(event)
    }

    pub fn apply_guild_members_chunk(&self, raw: &[u8]) -> CacheResult<GuildMembersChunk> {
        let event: GuildMembersChunk = decode(EventName::GuildMembersChunk, raw)?;

        {
            let mut users = self.users.lock();
            for user in event.members.iter().filter_map(|m| m.user.as_ref()) {
                users.insert_if_absent(user.id, user.clone());
            }
        }

        // Chunks describe members already counted in member_count
        self.with_guild(event.guild_id, |guild| {
            for member in &event.members {
                guild.upsert_member(member.without_user());
            }
        });
        Ok(event)
    }

    // ==================== Roles ====================

    pub fn apply_guild_role_create(&self, raw: &[u8]) -> CacheResult<GuildRoleCreate> {
        let event: GuildRoleCreate = decode(EventName::GuildRoleCreate, raw)?;
        self.with_guild(event.guild_id, |guild| guild.upsert_role(event.role.clone()));
        Ok(event)
    }

    pub fn apply_guild_role_update(&self, raw: &[u8]) -> CacheResult<GuildRoleUpdate> {
        let value: Value = decode(EventName::GuildRoleUpdate, raw)?;
        let event = GuildRoleUpdate::deserialize(&value)
            .map_err(|e| CacheError::decode(EventName::GuildRoleUpdate, e))?;

        self.with_guild(event.guild_id, |guild| {
            let role_id = event.role.id;
            let merged = match (guild.roles.iter_mut().find(|r| r.id == role_id), value.get("role")) {
                (Some(existing), Some(patch)) => {
                    log_merge(EventName::GuildRoleUpdate, existing.patch(patch));
                    existing.guild_id = Some(event.guild_id);
                    true
                }
                _ => false,
            };
            if !merged {
                guild.upsert_role(event.role.clone());
            }
        });
        Ok(event)
    }

    pub fn apply_guild_role_delete(&self, raw: &[u8]) -> CacheResult<GuildRoleDelete> {
        let event: GuildRoleDelete = decode(EventName::GuildRoleDelete, raw)?;
        self.with_guild(event.guild_id, |guild| guild.remove_role(event.role_id));
        Ok(event)
    }

    // ==================== Voice ====================

    pub fn apply_voice_state_update(&self, raw: &[u8]) -> CacheResult<VoiceStateUpdate> {
        let event: VoiceStateUpdate = decode(EventName::VoiceStateUpdate, raw)?;
        let state = &event.state;
        let key = (state.guild_id.unwrap_or_default(), state.user_id);

        let mut voice_states = self.voice_states.lock();
        if state.is_connected() {
            voice_states.insert(key, state.clone());
        } else {
            voice_states.remove(&key);
        }
        Ok(event)
    }

    // ==================== Read/write hooks ====================

    pub fn current_user(&self) -> Option<User> {
        self.current_user.lock().clone()
    }

    pub fn set_current_user(&self, user: User) {
        self.users.lock().insert(user.id, user.clone());
        *self.current_user.lock() = Some(user);
    }

    pub fn user(&self, user_id: Snowflake) -> Option<User> {
        self.users.lock().get(&user_id).cloned()
    }

    pub fn set_user(&self, user: User) {
        self.users.lock().insert(user.id, user);
    }

    pub fn channel(&self, channel_id: Snowflake) -> Option<Channel> {
        self.channels.lock().get(&channel_id).cloned()
    }

    pub fn set_channel(&self, channel: Channel) {
        self.channels.lock().insert(channel.id, channel.clone());
        if let Some(guild_id) = channel.guild_id {
            self.with_guild(guild_id, |guild| guild.upsert_channel(channel));
        }
    }

    /// Cached guild; unavailable placeholders count as a miss
    pub fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.guilds
            .lock()
            .get(&guild_id)
            .filter(|g| !g.unavailable)
            .cloned()
    }

    pub fn set_guild(&self, mut guild: Guild) {
        let lifted = normalize_guild(&mut guild);
        self.store_lifted(lifted);
        self.guilds.lock().insert(guild.id, guild);
    }

    /// Member with its user attached from the user cache
    pub fn guild_member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        let member = self
            .with_guild(guild_id, |guild| guild.member(user_id).cloned())
            .flatten()?;
        Some(self.attach_user(member))
    }

    pub fn set_guild_member(&self, guild_id: Snowflake, member: Member) {
        if let Some(user) = &member.user {
            self.users.lock().insert(user.id, user.clone());
        }
        self.with_guild(guild_id, |guild| guild.upsert_member(member.without_user()));
    }

    /// Every loaded member, or `None` when the guild has none loaded
    pub fn guild_members(&self, guild_id: Snowflake) -> Option<Vec<Member>> {
        let members = self
            .with_guild(guild_id, |guild| guild.members.clone())
            .filter(|members| !members.is_empty())?;
        Some(members.into_iter().map(|m| self.attach_user(m)).collect())
    }

    pub fn set_guild_members(&self, guild_id: Snowflake, members: Vec<Member>) {
        {
            let mut users = self.users.lock();
            for user in members.iter().filter_map(|m| m.user.as_ref()) {
                users.insert(user.id, user.clone());
            }
        }
        self.with_guild(guild_id, |guild| {
            for member in &members {
                guild.upsert_member(member.without_user());
            }
        });
    }

    pub fn guild_roles(&self, guild_id: Snowflake) -> Option<Vec<Role>> {
        self.with_guild(guild_id, |guild| guild.roles.clone())
            .filter(|roles| !roles.is_empty())
    }

    pub fn set_guild_roles(&self, guild_id: Snowflake, roles: Vec<Role>) {
        self.with_guild(guild_id, |guild| {
            guild.roles.clear();
            for role in roles {
                guild.upsert_role(role);
            }
        });
    }

    pub fn guild_channels(&self, guild_id: Snowflake) -> Option<Vec<Channel>> {
        self.with_guild(guild_id, |guild| guild.channels.clone())
            .filter(|channels| !channels.is_empty())
    }

    pub fn set_guild_channels(&self, guild_id: Snowflake, channels: Vec<Channel>) {
        {
            let mut cached = self.channels.lock();
            for channel in &channels {
                let mut channel = channel.clone();
                channel.guild_id = Some(guild_id);
                cached.insert(channel.id, channel);
            }
        }
        self.with_guild(guild_id, |guild| {
            guild.channels.clear();
            for channel in channels {
                guild.upsert_channel(channel);
            }
        });
    }

    pub fn voice_state(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<VoiceState> {
        self.voice_states.lock().get(&(guild_id, user_id)).cloned()
    }

    // ==================== Internals ====================

    /// Run `f` on a cached, available guild under the guild lock
    fn with_guild<R>(&self, guild_id: Snowflake, f: impl FnOnce(&mut Guild) -> R) -> Option<R> {
        let mut guilds = self.guilds.lock();
        guilds.get_mut(&guild_id).filter(|g| !g.unavailable).map(f)
    }

    fn attach_user(&self, mut member: Member) -> Member {
        if member.user.is_none() {
            member.user = self.users.lock().get(&member.user_id).cloned();
        }
        member
    }

    fn store_lifted(&self, lifted: Lifted) {
        if !lifted.users.is_empty() {
            let mut users = self.users.lock();
            for user in lifted.users {
                users.insert_if_absent(user.id, user);
            }
        }
        if !lifted.channels.is_empty() {
            let mut channels = self.channels.lock();
            for channel in lifted.channels {
                channels.insert(channel.id, channel);
            }
        }
        if !lifted.voice_states.is_empty() {
            let mut voice_states = self.voice_states.lock();
            for state in lifted.voice_states.into_iter().filter(VoiceState::is_connected) {
                let key = (state.guild_id.unwrap_or_default(), state.user_id);
                voice_states.insert(key, state);
            }
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Fix up back-references and pull out what lives in other maps
///
/// Members lose their embedded user, voice states move to the voice map,
/// channels are copied to the channel map.
fn normalize_guild(guild: &mut Guild) -> Lifted {
    let guild_id = guild.id;

    for role in &mut guild.roles {
        role.guild_id = Some(guild_id);
    }
    for channel in &mut guild.channels {
        channel.guild_id = Some(guild_id);
    }
    let users = guild
        .members
        .iter_mut()
        .filter_map(|member| {
            member.guild_id = Some(guild_id);
            member.user.take()
        })
        .collect();
    let voice_states = std::mem::take(&mut guild.voice_states)
        .into_iter()
        .map(|mut state| {
            state.guild_id = Some(guild_id);
            state
        })
        .collect();

    Lifted {
        users,
        channels: guild.channels.clone(),
        voice_states,
    }
}

fn decode<T: DeserializeOwned>(event: EventName, raw: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(raw).map_err(|e| CacheError::decode(event, e))
}

fn log_merge(event: EventName, result: ModelResult<()>) {
    if let Err(e) = result {
        warn!(event = %event, error = %e, "Failed to merge payload into cached entity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildlink_common::ErrorKind;
    use serde_json::json;

    fn cache() -> Cache {
        Cache::new(CacheConfig::default())
    }

    fn apply(cache: &Cache, name: EventName, payload: Value) -> GatewayEvent {
        cache.apply(name, payload.to_string().as_bytes()).unwrap()
    }

    fn sf(id: u64) -> Snowflake {
        Snowflake::new(id)
    }

    #[test]
    fn test_channel_update_merges_onto_create() {
        let cache = cache();
        apply(&cache, EventName::ChannelCreate, json!({"id": "5", "type": 0, "name": "a", "topic": "t"}));
        apply(&cache, EventName::ChannelUpdate, json!({"id": "5", "type": 0, "name": "b"}));

        let channel = cache.channel(sf(5)).unwrap();
        assert_eq!(channel.name.as_deref(), Some("b"));
        assert_eq!(channel.topic.as_deref(), Some("t"));
    }

    #[test]
    fn test_late_channel_create_keeps_update_fields() {
        let cache = cache();
        apply(&cache, EventName::ChannelUpdate, json!({"id": "5", "type": 0, "topic": "x"}));
        apply(&cache, EventName::ChannelCreate, json!({"id": "5", "type": 0, "name": "general"}));
        apply(&cache, EventName::ChannelCreate, json!({"id": "5", "type": 0, "name": "general"}));

        let channel = cache.channel(sf(5)).unwrap();
        assert_eq!(channel.name.as_deref(), Some("general"));
        assert_eq!(channel.topic.as_deref(), Some("x"));
    }

    #[test]
    fn test_channel_events_follow_guild_list() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g"}));
        apply(&cache, EventName::ChannelCreate, json!({"id": "5", "type": 0, "guild_id": "1", "name": "a"}));
        assert_eq!(cache.guild_channels(sf(1)).unwrap().len(), 1);

        apply(&cache, EventName::ChannelDelete, json!({"id": "5", "type": 0, "guild_id": "1"}));
        assert!(cache.channel(sf(5)).is_none());
        assert!(cache.guild_channels(sf(1)).is_none());

        // Deleting again is a no-op
        apply(&cache, EventName::ChannelDelete, json!({"id": "5", "type": 0, "guild_id": "1"}));
    }

    #[test]
    fn test_pins_update_requires_timestamp() {
        let cache = cache();
        apply(&cache, EventName::ChannelCreate, json!({"id": "5", "type": 0}));

        let event = apply(&cache, EventName::ChannelPinsUpdate, json!({"channel_id": "5"}));
        assert!(matches!(event, GatewayEvent::ChannelPinsUpdate(_)));
        assert!(cache.channel(sf(5)).unwrap().last_pin_timestamp.is_none());

        apply(
            &cache,
            EventName::ChannelPinsUpdate,
            json!({"channel_id": "5", "last_pin_timestamp": "2021-03-01T10:00:00+00:00"}),
        );
        assert!(cache.channel(sf(5)).unwrap().last_pin_timestamp.is_some());

        // Removing the last pin leaves the cached timestamp alone
        apply(&cache, EventName::ChannelPinsUpdate, json!({"channel_id": "5", "last_pin_timestamp": null}));
        assert!(cache.channel(sf(5)).unwrap().last_pin_timestamp.is_some());
    }

    #[test]
    fn test_unavailable_guild_replaced_by_update() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "42", "unavailable": true}));
        assert!(cache.guild(sf(42)).is_none());

        apply(&cache, EventName::GuildUpdate, json!({"id": "42", "name": "X"}));
        let guild = cache.guild(sf(42)).unwrap();
        assert!(!guild.unavailable);
        assert_eq!(guild.name, "X");
    }

    #[test]
    fn test_ready_resets_its_guilds() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "3", "name": "three"}));
        apply(&cache, EventName::GuildCreate, json!({"id": "4", "name": "four"}));

        apply(
            &cache,
            EventName::Ready,
            json!({
                "v": 10,
                "user": {"id": "100", "username": "bot", "discriminator": "0"},
                "guilds": [{"id": "3", "unavailable": true}],
                "session_id": "s"
            }),
        );
        assert!(cache.guild(sf(3)).is_none());
        assert_eq!(cache.guild(sf(4)).unwrap().name, "four");

        apply(&cache, EventName::GuildCreate, json!({"id": "3", "name": "renamed"}));
        assert_eq!(cache.guild(sf(3)).unwrap().name, "renamed");
    }

    #[test]
    fn test_duplicate_guild_create_is_ignored() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "7", "name": "first"}));
        apply(&cache, EventName::GuildCreate, json!({"id": "7", "name": "second"}));
        assert_eq!(cache.guild(sf(7)).unwrap().name, "first");
    }

    #[test]
    fn test_guild_create_over_loaded_guild_merges() {
        let cache = cache();
        apply(
            &cache,
            EventName::GuildCreate,
            json!({
                "id": "7",
                "name": "first",
                "member_count": 1,
                "members": [{"user": {"id": "9", "username": "bob"}, "roles": []}]
            }),
        );
        apply(&cache, EventName::GuildCreate, json!({"id": "7", "name": "second"}));

        let guild = cache.guild(sf(7)).unwrap();
        assert_eq!(guild.name, "second");
        assert_eq!(guild.members.len(), 1);
        assert!(guild.members[0].user.is_none());
        assert_eq!(cache.user(sf(9)).unwrap().username, "bob");
    }

    #[test]
    fn test_guild_update_merges_fields() {
        let cache = cache();
        apply(
            &cache,
            EventName::GuildCreate,
            json!({"id": "1", "name": "old", "icon": "abc", "roles": [{"id": "1", "name": "@everyone"}]}),
        );
        apply(&cache, EventName::GuildUpdate, json!({"id": "1", "name": "new"}));

        let guild = cache.guild(sf(1)).unwrap();
        assert_eq!(guild.name, "new");
        assert_eq!(guild.icon.as_deref(), Some("abc"));
        assert_eq!(guild.roles.len(), 1);
        assert_eq!(guild.roles[0].guild_id, Some(sf(1)));
    }

    #[test]
    fn test_guild_delete() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g", "channels": [{"id": "5", "type": 0}]}));
        assert!(cache.channel(sf(5)).is_some());

        apply(&cache, EventName::GuildDelete, json!({"id": "1", "unavailable": true}));
        assert!(cache.guild(sf(1)).is_none());
        assert_eq!(cache.stats().guilds, 1);

        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "back", "channels": [{"id": "5", "type": 0}]}));
        assert_eq!(cache.guild(sf(1)).unwrap().name, "back");

        apply(&cache, EventName::GuildDelete, json!({"id": "1"}));
        assert_eq!(cache.stats().guilds, 0);
        assert!(cache.channel(sf(5)).is_none());
    }

    #[test]
    fn test_member_add_twice_counts_once() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g"}));

        let add = json!({"guild_id": "1", "user": {"id": "9", "username": "bob"}, "roles": []});
        apply(&cache, EventName::GuildMemberAdd, add.clone());
        apply(&cache, EventName::GuildMemberAdd, add);

        let guild = cache.guild(sf(1)).unwrap();
        assert_eq!(guild.members.len(), 1);
        assert_eq!(guild.members[0].user_id, sf(9));
        assert_eq!(guild.member_count, 1);
    }

    #[test]
    fn test_member_add_keeps_richer_user() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g"}));
        let mut user = User::new(sf(9), "bob");
        user.email = Some("bob@example.com".to_string());
        cache.set_user(user);

        let event = apply(
            &cache,
            EventName::GuildMemberAdd,
            json!({"guild_id": "1", "user": {"id": "9", "username": "bob"}}),
        );
        let GatewayEvent::GuildMemberAdd(event) = event else {
            panic!("unexpected event");
        };
        // The event still carries the full payload
        assert!(event.member.user.is_some());

        assert_eq!(cache.user(sf(9)).unwrap().email.as_deref(), Some("bob@example.com"));
        let member = cache.guild_member(sf(1), sf(9)).unwrap();
        assert_eq!(member.user.unwrap().email.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn test_member_remove_missing_is_noop() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g"}));
        apply(&cache, EventName::GuildMemberAdd, json!({"guild_id": "1", "user": {"id": "9"}}));

        apply(&cache, EventName::GuildMemberRemove, json!({"guild_id": "1", "user": {"id": "10"}}));
        let guild = cache.guild(sf(1)).unwrap();
        assert_eq!(guild.members.len(), 1);
        assert_eq!(guild.member_count, 1);

        apply(&cache, EventName::GuildMemberRemove, json!({"guild_id": "1", "user": {"id": "9"}}));
        let guild = cache.guild(sf(1)).unwrap();
        assert!(guild.members.is_empty());
        assert_eq!(guild.member_count, 0);
    }

    #[test]
    fn test_member_update_and_chunk() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g", "member_count": 3}));
        apply(
            &cache,
            EventName::GuildMembersChunk,
            json!({
                "guild_id": "1",
                "members": [{"user": {"id": "9"}}, {"user": {"id": "10"}}],
                "chunk_index": 0,
                "chunk_count": 1
            }),
        );
        let guild = cache.guild(sf(1)).unwrap();
        assert_eq!(guild.members.len(), 2);
        assert_eq!(guild.member_count, 3);

        apply(
            &cache,
            EventName::GuildMemberUpdate,
            json!({"guild_id": "1", "user": {"id": "9", "username": "bob"}, "nick": "bobby", "roles": ["4"]}),
        );
        let member = cache.guild_member(sf(1), sf(9)).unwrap();
        assert_eq!(member.nick.as_deref(), Some("bobby"));
        assert!(member.has_role(sf(4)));
        assert_eq!(member.user.unwrap().username, "bob");
    }

    #[test]
    fn test_role_events() {
        let cache = cache();
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g"}));
        apply(
            &cache,
            EventName::GuildRoleCreate,
            json!({"guild_id": "1", "role": {"id": "3", "name": "mods", "color": 5}}),
        );
        apply(
            &cache,
            EventName::GuildRoleUpdate,
            json!({"guild_id": "1", "role": {"id": "3", "name": "admins"}}),
        );

        let roles = cache.guild_roles(sf(1)).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "admins");
        assert_eq!(roles[0].color, 5);
        assert_eq!(roles[0].guild_id, Some(sf(1)));

        apply(&cache, EventName::GuildRoleDelete, json!({"guild_id": "1", "role_id": "3"}));
        assert!(cache.guild_roles(sf(1)).is_none());
    }

    #[test]
    fn test_voice_state_lifecycle() {
        let cache = cache();
        apply(
            &cache,
            EventName::VoiceStateUpdate,
            json!({"guild_id": "1", "channel_id": "2", "user_id": "9", "session_id": "s"}),
        );
        assert!(cache.voice_state(sf(1), sf(9)).is_some());

        apply(
            &cache,
            EventName::VoiceStateUpdate,
            json!({"guild_id": "1", "channel_id": null, "user_id": "9", "session_id": "s"}),
        );
        assert!(cache.voice_state(sf(1), sf(9)).is_none());
    }

    #[test]
    fn test_ready_and_user_update() {
        let cache = cache();
        apply(
            &cache,
            EventName::Ready,
            json!({"v": 10, "user": {"id": "5", "username": "bot", "bot": true}, "guilds": [], "session_id": "s"}),
        );
        assert_eq!(cache.current_user().unwrap().username, "bot");

        apply(&cache, EventName::UserUpdate, json!({"id": "5", "username": "renamed"}));
        let user = cache.current_user().unwrap();
        assert_eq!(user.username, "renamed");
        assert!(user.bot);
        assert_eq!(cache.user(sf(5)).unwrap().username, "renamed");
    }

    #[test]
    fn test_guild_limit_evicts() {
        let cache = Cache::new(CacheConfig {
            limit_guilds: 1,
            ..CacheConfig::default()
        });
        apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "a"}));
        apply(&cache, EventName::GuildCreate, json!({"id": "2", "name": "b"}));
        assert!(cache.guild(sf(1)).is_none());
        assert!(cache.guild(sf(2)).is_some());
    }

    #[test]
    fn test_disabled_cache_passes_events_through() {
        let cache = Cache::new(CacheConfig::disabled());
        assert!(cache.tracked_events().is_empty());

        let event = apply(&cache, EventName::GuildCreate, json!({"id": "1", "name": "g"}));
        assert_eq!(event.guild_id(), Some(sf(1)));
        assert!(cache.guild(sf(1)).is_none());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_decode_error() {
        let cache = cache();
        let err = cache.apply(EventName::GuildCreate, b"{").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("GUILD_CREATE"));
    }

    #[test]
    fn test_uncached_events_are_decoded() {
        let cache = cache();
        let event = apply(
            &cache,
            EventName::MessageCreate,
            json!({"id": "1", "channel_id": "2", "content": "hi"}),
        );
        assert_eq!(event.name(), EventName::MessageCreate);
    }

    #[test]
    fn test_tracked_events_follow_limits() {
        let cache = Cache::new(CacheConfig {
            limit_guilds: 0,
            ..CacheConfig::default()
        });
        let events = cache.tracked_events();
        assert!(events.contains(&EventName::ChannelCreate));
        assert!(events.contains(&EventName::Ready));
        assert!(!events.contains(&EventName::GuildMemberAdd));
    }
}
