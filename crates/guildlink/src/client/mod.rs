//! Client composition root
//!
//! A [`Client`] wires the REST client, the cache, the shard manager and the
//! demultiplexer together around one shared rate limiter. It is a cheap
//! handle; clones share everything, and handlers receive one as their
//! session.

mod intake;
mod rest;

use crate::demux::{EventDemultiplexer, Listener};
use crate::error::{ClientError, ClientResult};
use guildlink_cache::Cache;
use guildlink_common::{ClientConfig, RateLimiter};
use guildlink_core::{EventName, GatewayEvent, Snowflake};
use guildlink_gateway::protocol::{RequestGuildMembers, UpdateVoiceState};
use guildlink_gateway::{
    Command, Disconnect, EventEnvelope, ManagerConfig, ShardManager, UpdateStatus,
};
use guildlink_http::{resources, Requester, RestClient};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Where the client is in its connect/disconnect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Never connected, or disconnected; `connect` bootstraps from scratch
    Idle,
    Connecting,
    Connected,
    /// Shards closed with their sessions kept; `connect` resumes them
    Suspended,
}

/// Gateway client handle
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    rest: Arc<dyn Requester>,
    cache: Cache,
    shards: ShardManager,
    demux: EventDemultiplexer<Client>,
    lifecycle: Mutex<Lifecycle>,
    bot_id: Mutex<Option<Snowflake>>,
    /// Flips to true once every shard has seen its first READY
    all_ready: watch::Sender<bool>,
    /// Parked here while the intake loop is not running
    events: Mutex<Option<mpsc::Receiver<EventEnvelope>>>,
    intake: Mutex<Option<JoinHandle<mpsc::Receiver<EventEnvelope>>>>,
    stop_intake: watch::Sender<bool>,
}

impl Client {
    /// Build a client talking to the configured REST API
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::new(config.cancel_on_rate_limit));
        let rest = RestClient::new(&config, Arc::clone(&limiter))?;
        Ok(Self::build(config, limiter, Arc::new(rest)))
    }

    /// Build a client on a caller-supplied REST transport
    pub fn with_requester(config: ClientConfig, rest: Arc<dyn Requester>) -> ClientResult<Self> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::new(config.cancel_on_rate_limit));
        Ok(Self::build(config, limiter, rest))
    }

    fn build(config: ClientConfig, limiter: Arc<RateLimiter>, rest: Arc<dyn Requester>) -> Self {
        let cache = Cache::new(config.cache);
        let shards = ShardManager::new(limiter, config.event_queue_size);
        for event in cache.tracked_events() {
            shards.track_event(event);
        }
        let events = shards.take_events();
        let demux = EventDemultiplexer::new(
            config
                .activate_event_channels
                .then_some(config.event_channel_size),
        );

        Self {
            inner: Arc::new(ClientInner {
                config,
                rest,
                cache,
                shards,
                demux,
                lifecycle: Mutex::new(Lifecycle::Idle),
                bot_id: Mutex::new(None),
                all_ready: watch::channel(false).0,
                events: Mutex::new(events),
                intake: Mutex::new(None),
                stop_intake: watch::channel(false).0,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    pub fn rest(&self) -> &Arc<dyn Requester> {
        &self.inner.rest
    }

    pub fn shards(&self) -> &ShardManager {
        &self.inner.shards
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.lock()
    }

    /// Id of the bot user, known after `connect` authenticated
    pub fn bot_id(&self) -> Option<Snowflake> {
        *self.inner.bot_id.lock()
    }

    /// Bring every shard up
    ///
    /// The first call authenticates through REST, resolves the gateway URL
    /// and shard count, prepares the shards and starts the intake loop.
    /// After `suspend`, the kept sessions are resumed instead.
    pub async fn connect(&self) -> ClientResult<()> {
        let previous = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match *lifecycle {
                Lifecycle::Connecting | Lifecycle::Connected => {
                    return Err(ClientError::AlreadyConnected)
                }
                state => {
                    *lifecycle = Lifecycle::Connecting;
                    state
                }
            }
        };

        let result = self.bring_up(previous).await;
        let mut lifecycle = self.inner.lifecycle.lock();
        match &result {
            Ok(()) => *lifecycle = Lifecycle::Connected,
            Err(_) => *lifecycle = previous,
        }
        result
    }

    async fn bring_up(&self, previous: Lifecycle) -> ClientResult<()> {
        if previous == Lifecycle::Idle {
            self.bootstrap().await?;
        }
        self.start_intake();

        if let Err(e) = self.inner.shards.connect().await {
            if previous == Lifecycle::Idle {
                self.stop_intake().await;
            }
            return Err(e.into());
        }
        info!(
            shards = ?self.inner.shards.shard_ids(),
            shard_count = self.inner.shards.shard_count(),
            "Client connected"
        );
        Ok(())
    }

    async fn bootstrap(&self) -> ClientResult<()> {
        let rest = self.inner.rest.as_ref();
        let me = resources::current_user(rest).await?;
        info!(user_id = %me.id, username = %me.username, "Authenticated");
        *self.inner.bot_id.lock() = Some(me.id);
        // Fresh sessions rebuild the cache from their own READY
        self.inner.cache.clear();
        self.inner.cache.set_current_user(me);

        let config = &self.inner.config;
        let (url, shard_count) = match (&config.gateway_url, config.shards.shard_count) {
            (Some(url), Some(count)) => (url.clone(), count),
            (url, count) => {
                let gateway = resources::gateway_bot(rest).await?;
                (
                    url.clone().unwrap_or(gateway.url),
                    count.unwrap_or(gateway.shards),
                )
            }
        };

        self.inner.all_ready.send_replace(false);
        self.inner
            .shards
            .prepare(&ManagerConfig::from_client_config(config, url, shard_count));
        Ok(())
    }

    /// Close every shard and stop the intake loop
    ///
    /// The next `connect` starts over with fresh sessions.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let result = self.inner.shards.disconnect(Disconnect::Close).await;
        self.stop_intake().await;
        self.inner.all_ready.send_replace(false);
        *self.inner.lifecycle.lock() = Lifecycle::Idle;
        info!("Client disconnected");
        Ok(result?)
    }

    /// Close every shard but keep their sessions for a later resume
    pub async fn suspend(&self) -> ClientResult<()> {
        let result = self.inner.shards.disconnect(Disconnect::KeepSession).await;
        *self.inner.lifecycle.lock() = Lifecycle::Suspended;
        info!("Client suspended");
        Ok(result?)
    }

    /// Register listeners for `event`: middlewares, then handlers, then an
    /// optional controller
    ///
    /// The event is tracked from now on. Returns the registration id.
    pub fn on(&self, event: EventName, listeners: Vec<Listener<Client>>) -> ClientResult<u64> {
        let id = self.inner.demux.register(event, listeners)?;
        self.inner.shards.track_event(event);
        Ok(id)
    }

    /// Drop a registration made with `on`
    pub fn off(&self, event: EventName, id: u64) -> bool {
        self.inner.demux.deregister(event, id)
    }

    /// Track events without registering handlers
    pub fn accept_event(&self, events: impl IntoIterator<Item = EventName>) {
        for event in events {
            self.inner.shards.track_event(event);
        }
    }

    /// Receiver for every `event`; needs event channels activated and can
    /// be taken once per event
    pub fn event_channel(
        &self,
        event: EventName,
    ) -> ClientResult<mpsc::Receiver<Arc<GatewayEvent>>> {
        let rx = self.inner.demux.event_channel(event)?;
        self.inner.shards.track_event(event);
        Ok(rx)
    }

    /// Send a gateway command by name
    pub async fn emit(&self, command: &str, data: Value) -> ClientResult<()> {
        Ok(self.inner.shards.emit_raw(command, data).await?)
    }

    pub async fn update_status(&self, status: UpdateStatus) -> ClientResult<()> {
        self.emit_command(Command::UpdateStatus(status)).await
    }

    pub async fn update_voice_state(&self, state: UpdateVoiceState) -> ClientResult<()> {
        self.emit_command(Command::UpdateVoiceState(state)).await
    }

    pub async fn request_guild_members(&self, request: RequestGuildMembers) -> ClientResult<()> {
        self.emit_command(Command::RequestGuildMembers(request)).await
    }

    async fn emit_command(&self, command: Command) -> ClientResult<()> {
        command.validate()?;
        Ok(self.inner.shards.emit(&command).await?)
    }

    /// Run `callback` once every shard has received its first READY
    pub fn ready<F>(&self, callback: F)
    where
        F: FnOnce(Client) + Send + 'static,
    {
        let client = self.clone();
        let mut ready = self.inner.all_ready.subscribe();
        tokio::spawn(async move {
            if ready.wait_for(|ready| *ready).await.is_ok() {
                callback(client);
            }
        });
    }

    /// Mean heartbeat round trip across shards
    pub fn heartbeat_latency(&self) -> Duration {
        self.inner.shards.avg_heartbeat_latency()
    }

    /// Guilds announced to any shard of this client
    pub fn connected_guilds(&self) -> Vec<Snowflake> {
        self.inner.shards.connected_guilds()
    }

    fn start_intake(&self) {
        let mut intake = self.inner.intake.lock();
        if intake.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let Some(events) = self.inner.events.lock().take() else {
            warn!("Event queue unavailable, intake loop not started");
            return;
        };
        self.inner.stop_intake.send_replace(false);
        *intake = Some(tokio::spawn(intake::run(
            self.clone(),
            events,
            self.inner.stop_intake.subscribe(),
        )));
    }

    async fn stop_intake(&self) {
        self.inner.stop_intake.send_replace(true);
        let task = self.inner.intake.lock().take();
        if let Some(task) = task {
            match task.await {
                Ok(events) => *self.inner.events.lock() = Some(events),
                Err(e) => warn!(error = %e, "Intake loop ended abnormally"),
            }
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("lifecycle", &self.lifecycle())
            .field("bot_id", &self.bot_id())
            .field("shards", &self.inner.shards)
            .finish()
    }
}

#[cfg(test)]
mod tests;
