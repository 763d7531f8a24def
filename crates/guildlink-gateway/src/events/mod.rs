//! Dispatch events leaving the shards
//!
//! Shards wrap each tracked dispatch in an [`EventEnvelope`]; decoding into a
//! [`guildlink_core::GatewayEvent`] happens in the intake loop.

mod envelope;
mod tracked;

pub use envelope::EventEnvelope;
pub use tracked::{TrackedEvents, ALWAYS_TRACKED};
