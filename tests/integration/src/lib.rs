//! Integration test utilities for guildlink
//!
//! Mock gateway and REST servers a real [`guildlink::Client`] can connect
//! to, plus payload fixtures and polling helpers.

pub mod fixtures;
pub mod gateway;
pub mod helpers;
pub mod rest;

pub use fixtures::*;
pub use gateway::MockGateway;
pub use helpers::*;
pub use rest::MockRest;
