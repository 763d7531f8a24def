//! Gateway error types

use crate::protocol::CloseCode;
use guildlink_common::{ErrorKind, RateLimitError};
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Socket ended without a close code we recognise
    #[error("shard {shard_id} connection closed")]
    ConnectionClosed { shard_id: u32 },

    /// Closed with a code that forbids reconnecting
    #[error("shard {shard_id} closed by the gateway: {code}")]
    FatalClose { shard_id: u32, code: CloseCode },

    #[error("shard {shard_id} got no {expected} within {timeout:?}")]
    HandshakeTimeout {
        shard_id: u32,
        expected: &'static str,
        timeout: Duration,
    },

    #[error("expected {expected}, got op {got}")]
    UnexpectedFrame { expected: &'static str, got: String },

    #[error("invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Command name outside the allow-list
    #[error("unsupported gateway command: {0}")]
    UnsupportedCommand(String),

    #[error("invalid data for {command}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("shard manager has no shards; call prepare first")]
    NotPrepared,

    #[error("shard {0} is not connected")]
    NotConnected(u32),

    #[error("shard {shard_id} did not shut down cleanly: {reason}")]
    Shutdown { shard_id: u32, reason: String },

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    /// Several shards failed during a bulk operation
    #[error("{} shard(s) failed: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<GatewayError>),
}

fn join_errors(errors: &[GatewayError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WebSocket(_)
            | Self::ConnectionClosed { .. }
            | Self::HandshakeTimeout { .. }
            | Self::NotConnected(_)
            | Self::Shutdown { .. }
            | Self::Multiple(_) => ErrorKind::Transport,
            Self::FatalClose { .. } | Self::UnexpectedFrame { .. } | Self::Decode(_) => {
                ErrorKind::Protocol
            }
            Self::UnsupportedCommand(_) | Self::InvalidCommand { .. } | Self::NotPrepared => {
                ErrorKind::Usage
            }
            Self::RateLimited(e) => e.kind(),
        }
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
