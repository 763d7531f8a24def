//! Shard manager
//!
//! Owns every shard run by this process. Shards share one rate limiter, one
//! tracked-event set and one bounded event queue; the queue's receiver is
//! handed to the client intake loop.

use super::connection::{
    command_bucket, Connection, ConnectionConfig, ConnectionState, Disconnect, COMMAND_LIMIT,
    COMMAND_WINDOW, IDENTIFY_BUCKET,
};
use crate::command::Command;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{EventEnvelope, TrackedEvents};
use crate::protocol::Intents;
use guildlink_common::{ClientConfig, RateLimiter};
use guildlink_core::{EventName, Snowflake};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every shard
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub token: String,
    pub url: String,
    /// Shards run by this process
    pub shard_ids: Vec<u32>,
    /// Total shards across every process using the token
    pub shard_count: u32,
    pub intents: Intents,
    pub large_threshold: u32,
    pub gateway_version: u8,
    pub identify_interval: Duration,
    pub project_name: String,
    pub ready_timeout: Duration,
}

impl ManagerConfig {
    /// Derive shard settings once the gateway URL and shard count are known
    ///
    /// Runs shards `0..min(shard_limit, shard_count)`.
    pub fn from_client_config(config: &ClientConfig, url: impl Into<String>, shard_count: u32) -> Self {
        let shard_count = shard_count.max(1);
        let running = config
            .shards
            .shard_limit
            .map_or(shard_count, |limit| limit.clamp(1, shard_count));
        let intents = config
            .shards
            .intents
            .map_or_else(Intents::non_privileged, Intents::from_bits_truncate);

        Self {
            token: config.bot_token.clone(),
            url: url.into(),
            shard_ids: (0..running).collect(),
            shard_count,
            intents,
            large_threshold: config.shards.large_threshold,
            gateway_version: config.shards.gateway_version,
            identify_interval: config.shards.identify_interval,
            project_name: config.project_name.clone(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    fn connection_config(&self, shard_id: u32) -> ConnectionConfig {
        ConnectionConfig {
            shard_id,
            shard_count: self.shard_count,
            url: self.url.clone(),
            token: self.token.clone(),
            intents: self.intents,
            large_threshold: self.large_threshold,
            gateway_version: self.gateway_version,
            project_name: self.project_name.clone(),
            presence: None,
            ready_timeout: self.ready_timeout,
        }
    }
}

/// Shard that owns a guild's events
#[inline]
pub fn shard_for_guild(guild_id: Snowflake, shard_count: u32) -> u32 {
    let count = u64::from(shard_count.max(1));
    ((guild_id.get() >> 22) % count) as u32
}

/// Manages the shards of one client
pub struct ShardManager {
    limiter: Arc<RateLimiter>,
    tracked: Arc<TrackedEvents>,
    /// Write-locked only by `prepare`
    shards: RwLock<Vec<Arc<Connection>>>,
    shard_count: AtomicU32,
    events_tx: mpsc::Sender<EventEnvelope>,
    events_rx: Mutex<Option<mpsc::Receiver<EventEnvelope>>>,
}

impl ShardManager {
    /// `queue_size` bounds the event queue shared by every shard
    pub fn new(limiter: Arc<RateLimiter>, queue_size: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(queue_size.max(1));
        Self {
            limiter,
            tracked: Arc::new(TrackedEvents::new()),
            shards: RwLock::new(Vec::new()),
            shard_count: AtomicU32::new(0),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn tracked(&self) -> &Arc<TrackedEvents> {
        &self.tracked
    }

    /// Forward `name` to the event queue from now on
    pub fn track_event(&self, name: EventName) {
        if self.tracked.track(name) {
            debug!(event = %name, "Tracking event");
        }
    }

    /// Receiver of the shared event queue; `None` after the first call
    pub fn take_events(&self) -> Option<mpsc::Receiver<EventEnvelope>> {
        self.events_rx.lock().take()
    }

    /// Build the shards and their rate limit buckets
    ///
    /// Replaces any previously prepared shards; call before `connect`.
    pub fn prepare(&self, config: &ManagerConfig) {
        self.limiter
            .register_fixed(IDENTIFY_BUCKET, 1, config.identify_interval);

        let shards: Vec<_> = config
            .shard_ids
            .iter()
            .map(|&shard_id| {
                self.limiter
                    .register_fixed(command_bucket(shard_id), COMMAND_LIMIT, COMMAND_WINDOW);
                Connection::new(
                    config.connection_config(shard_id),
                    Arc::clone(&self.limiter),
                    Arc::clone(&self.tracked),
                    self.events_tx.clone(),
                )
            })
            .collect();

        info!(
            shards = ?config.shard_ids,
            shard_count = config.shard_count,
            "Prepared shards"
        );
        self.shard_count.store(config.shard_count, Ordering::Release);
        *self.shards.write() = shards;
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.shards.read().clone()
    }

    /// Open every shard in order, waiting for each READY
    ///
    /// On the first failure the shards already opened are shut down again
    /// and the error is returned.
    pub async fn connect(&self) -> GatewayResult<()> {
        let shards = self.snapshot();
        if shards.is_empty() {
            return Err(GatewayError::NotPrepared);
        }

        for (index, shard) in shards.iter().enumerate() {
            if let Err(e) = shard.open().await {
                warn!(shard_id = shard.shard_id(), error = %e, "Shard failed to connect, aborting");
                for opened in &shards[..=index] {
                    let _ = opened.disconnect(Disconnect::Close).await;
                }
                return Err(e);
            }
            info!(shard_id = shard.shard_id(), "Shard ready");
        }
        Ok(())
    }

    /// Shut every shard down with `mode`, collecting failures
    pub async fn disconnect(&self, mode: Disconnect) -> GatewayResult<()> {
        let mut errors = Vec::new();
        for shard in self.snapshot() {
            if let Err(e) = shard.disconnect(mode).await {
                warn!(shard_id = shard.shard_id(), error = %e, "Shard did not disconnect cleanly");
                errors.push(e);
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(GatewayError::Multiple(errors)),
        }
    }

    /// Send a command to the shard owning its guild, or to every shard
    pub async fn emit(&self, command: &Command) -> GatewayResult<()> {
        let shards = self.snapshot();
        if shards.is_empty() {
            return Err(GatewayError::NotPrepared);
        }

        if let Some(guild_id) = command.guild_id() {
            let shard_id = shard_for_guild(guild_id, self.shard_count());
            let shard = shards
                .iter()
                .find(|shard| shard.shard_id() == shard_id)
                .ok_or(GatewayError::NotConnected(shard_id))?;
            return shard.send_command(command).await;
        }

        let mut errors = Vec::new();
        for shard in &shards {
            if let Err(e) = shard.send_command(command).await {
                errors.push(e);
            }
        }
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(GatewayError::Multiple(errors)),
        }
    }

    /// Validate and send a command given by name
    pub async fn emit_raw(&self, name: &str, data: Value) -> GatewayResult<()> {
        let command = Command::from_raw(name, data)?;
        self.emit(&command).await
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count.load(Ordering::Acquire)
    }

    pub fn shard_ids(&self) -> Vec<u32> {
        self.shards.read().iter().map(|shard| shard.shard_id()).collect()
    }

    pub fn shard(&self, shard_id: u32) -> Option<Arc<Connection>> {
        self.shards
            .read()
            .iter()
            .find(|shard| shard.shard_id() == shard_id)
            .cloned()
    }

    pub fn states(&self) -> Vec<(u32, ConnectionState)> {
        self.shards
            .read()
            .iter()
            .map(|shard| (shard.shard_id(), shard.state()))
            .collect()
    }

    /// Mean of the latest heartbeat round trips; zero before any ack
    pub fn avg_heartbeat_latency(&self) -> Duration {
        let latencies: Vec<Duration> = self
            .shards
            .read()
            .iter()
            .filter_map(|shard| shard.heartbeat_latency())
            .collect();
        if latencies.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = latencies.iter().sum();
        total / latencies.len() as u32
    }

    /// True once every shard has seen its first READY
    pub fn all_ready(&self) -> bool {
        let shards = self.shards.read();
        !shards.is_empty() && shards.iter().all(|shard| shard.has_received_ready())
    }

    /// Wait until every shard has seen its first READY
    pub async fn wait_ready(&self) {
        for shard in self.snapshot() {
            let mut ready = shard.subscribe_ready();
            let _ = ready.wait_for(|ready| *ready).await;
        }
    }

    /// Guilds announced to every shard, in shard order
    pub fn connected_guilds(&self) -> Vec<Snowflake> {
        self.shards
            .read()
            .iter()
            .flat_map(|shard| shard.guilds())
            .collect()
    }

    pub fn add_guild(&self, shard_id: u32, guild_id: Snowflake) -> bool {
        self.shard(shard_id)
            .is_some_and(|shard| shard.add_guild(guild_id))
    }

    pub fn remove_guild(&self, shard_id: u32, guild_id: Snowflake) -> bool {
        self.shard(shard_id)
            .is_some_and(|shard| shard.remove_guild(guild_id))
    }

    pub fn clear_guilds(&self, shard_id: u32) {
        if let Some(shard) = self.shard(shard_id) {
            shard.clear_guilds();
        }
    }
}

impl std::fmt::Debug for ShardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("shards", &self.shard_ids())
            .field("shard_count", &self.shard_count())
            .field("tracked", &self.tracked.len())
            .finish()
    }
}
