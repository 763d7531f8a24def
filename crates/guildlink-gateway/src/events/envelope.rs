//! Dispatch envelope handed from the shards to the intake loop

use guildlink_core::{EventName, GatewayEvent, ModelResult};

/// One received dispatch, not yet decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub name: EventName,
    pub shard_id: u32,
    pub sequence: u64,
    /// The frame's `d` field as JSON bytes
    pub raw: Vec<u8>,
}

impl EventEnvelope {
    pub fn new(name: EventName, shard_id: u32, sequence: u64, raw: Vec<u8>) -> Self {
        Self {
            name,
            shard_id,
            sequence,
            raw,
        }
    }

    /// Decode the payload into the variant for its name
    pub fn decode(&self) -> ModelResult<GatewayEvent> {
        GatewayEvent::decode(self.name, &self.raw)
    }
}
