//! Per-shard session state
//!
//! Everything a shard needs to resume after a dropped socket, plus the
//! heartbeat bookkeeping. Owned by its [`super::Connection`].

use std::time::Duration;
use tokio::time::Instant;

/// Session state of one shard
#[derive(Debug, Clone, Default)]
pub struct ShardSession {
    pub shard_id: u32,
    /// Last dispatch sequence seen in this session
    pub sequence: Option<u64>,
    /// Set by READY, required for Resume
    pub session_id: Option<String>,
    pub resume_url: Option<String>,
    pub heartbeat_interval: Option<Duration>,
    pub last_heartbeat_sent: Option<Instant>,
    pub last_heartbeat_ack: Option<Instant>,
    /// Round trip of the last acknowledged heartbeat
    pub latency: Option<Duration>,
    /// A heartbeat went out and its ack has not arrived yet
    pub ack_pending: bool,
}

impl ShardSession {
    pub fn new(shard_id: u32) -> Self {
        Self {
            shard_id,
            ..Self::default()
        }
    }

    /// Session id and sequence to resume with, if the session is resumable
    pub fn resume_info(&self) -> Option<(String, u64)> {
        match (&self.session_id, self.sequence) {
            (Some(id), Some(seq)) => Some((id.clone(), seq)),
            _ => None,
        }
    }

    /// Record a dispatch sequence; sequences never move backwards
    pub fn record_sequence(&mut self, sequence: u64) {
        if self.sequence.map_or(true, |current| sequence > current) {
            self.sequence = Some(sequence);
        }
    }

    /// Forget the session so the next handshake identifies fresh
    pub fn invalidate(&mut self) {
        self.sequence = None;
        self.session_id = None;
        self.resume_url = None;
    }

    /// Reset heartbeat state for a new socket
    pub fn start_heartbeating(&mut self, interval: Duration) {
        self.heartbeat_interval = Some(interval);
        self.ack_pending = false;
        self.last_heartbeat_sent = None;
    }

    /// Mark a heartbeat as sent; returns the sequence it should carry
    pub fn heartbeat_sent(&mut self, now: Instant) -> Option<u64> {
        self.ack_pending = true;
        self.last_heartbeat_sent = Some(now);
        self.sequence
    }

    pub fn heartbeat_acked(&mut self, now: Instant) {
        self.ack_pending = false;
        self.last_heartbeat_ack = Some(now);
        if let Some(sent) = self.last_heartbeat_sent {
            self.latency = Some(now.saturating_duration_since(sent));
        }
    }
}
