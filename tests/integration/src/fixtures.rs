//! Payload fixtures
//!
//! JSON shapes the mock servers answer with.

use serde_json::{json, Value};

pub const BOT_ID: u64 = 100;
pub const BOT_NAME: &str = "probe-bot";
pub const BOT_TOKEN: &str = "integration-token";
pub const SESSION_ID: &str = "mock-session";

/// Guilds announced in READY
pub const READY_GUILDS: [u64; 2] = [1, 2];

pub fn user(id: u64, username: &str) -> Value {
    json!({"id": id.to_string(), "username": username, "discriminator": "0"})
}

pub fn guild(id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "roles": [{"id": id.to_string(), "name": "@everyone"}]
    })
}

pub fn channel(id: u64, guild_id: u64) -> Value {
    json!({"id": id.to_string(), "guild_id": guild_id.to_string(), "type": 0, "name": "general"})
}

pub fn gateway_bot(url: &str, shards: u32) -> Value {
    json!({
        "url": url,
        "shards": shards,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 14_400_000,
            "max_concurrency": 1
        }
    })
}

pub fn hello(heartbeat_interval: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}})
}

pub fn heartbeat_ack() -> Value {
    json!({"op": 11})
}

pub fn dispatch(event: &str, sequence: u64, data: Value) -> Value {
    json!({"op": 0, "t": event, "s": sequence, "d": data})
}

pub fn ready() -> Value {
    let guilds: Vec<Value> = READY_GUILDS
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    json!({
        "v": 10,
        "user": user(BOT_ID, BOT_NAME),
        "guilds": guilds,
        "session_id": SESSION_ID
    })
}

pub fn message(id: u64, channel_id: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "author": user(7, "someone"),
        "content": content
    })
}
