//! Error classification
//!
//! Every crate error maps onto one of these kinds so callers can decide how
//! to react without matching on each crate's enum.

use std::fmt;

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Websocket closed or broken; recovered by reconnecting
    Transport,
    /// Unexpected opcode or undecodable payload; the frame is dropped
    Protocol,
    /// Local or remote rate limit hit
    RateLimit,
    /// Caller mistake: bad registration, unsupported command, bad id
    Usage,
    /// REST request failed or returned an error status
    Http,
    /// Invalid configuration
    Config,
    /// Entity absent from the cache; callers fall back to REST
    CacheMiss,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::RateLimit => "rate_limit",
            Self::Usage => "usage",
            Self::Http => "http",
            Self::Config => "config",
            Self::CacheMiss => "cache_miss",
        }
    }

    /// Whether the library recovers from this kind on its own
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::Transport | Self::Protocol | Self::RateLimit | Self::CacheMiss
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
