//! Intake loop
//!
//! The one task draining the shard event queue: decode through the cache,
//! keep the per-shard guild lists current, then hand the event to the
//! demultiplexer. Running it on a single task keeps per-shard order.

use super::Client;
use guildlink_core::GatewayEvent;
use guildlink_gateway::EventEnvelope;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Drain `events` until stopped; hands the queue back for the next run
pub(super) async fn run(
    client: Client,
    mut events: mpsc::Receiver<EventEnvelope>,
    mut stop: watch::Receiver<bool>,
) -> mpsc::Receiver<EventEnvelope> {
    info!("Intake loop started");
    loop {
        tokio::select! {
            biased;
            _ = stop.wait_for(|stop| *stop) => break,
            envelope = events.recv() => match envelope {
                Some(envelope) => client.process(envelope),
                None => {
                    warn!("Event queue closed");
                    break;
                }
            },
        }
    }
    info!("Intake loop stopped");
    events
}

impl Client {
    pub(super) fn process(&self, envelope: EventEnvelope) {
        let EventEnvelope {
            name,
            shard_id,
            sequence,
            raw,
        } = envelope;

        let event = match self.inner.cache.apply(name, &raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(shard_id, event = %name, sequence, error = %e, "Dropping undecodable event");
                return;
            }
        };

        self.track_guilds(shard_id, &event);
        if matches!(event, GatewayEvent::Ready(_)) && self.inner.shards.all_ready() {
            self.inner.all_ready.send_replace(true);
        }

        debug!(shard_id, event = %name, sequence, "Dispatching event");
        self.inner.demux.trigger(self, Arc::new(event));
    }

    fn track_guilds(&self, shard_id: u32, event: &GatewayEvent) {
        let shards = &self.inner.shards;
        match event {
            GatewayEvent::Ready(ready) => {
                shards.clear_guilds(shard_id);
                for guild in &ready.guilds {
                    shards.add_guild(shard_id, guild.id);
                }
            }
            GatewayEvent::GuildCreate(create) => {
                shards.add_guild(shard_id, create.guild.id);
            }
            GatewayEvent::GuildDelete(delete) => {
                shards.remove_guild(shard_id, delete.guild.id);
            }
            _ => {}
        }
    }
}
