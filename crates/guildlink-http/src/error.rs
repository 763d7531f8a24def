//! REST error types

use guildlink_common::{ErrorKind, RateLimitError};
use thiserror::Error;

/// REST error type
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success status after rate limit handling
    #[error("{method} {endpoint} returned {status}: {body}")]
    Status {
        method: &'static str,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Bad argument caught before sending
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl HttpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Request(_) | Self::Status { .. } => ErrorKind::Http,
            Self::RateLimited(e) => e.kind(),
            Self::Decode(_) => ErrorKind::Protocol,
            Self::InvalidArgument(_) => ErrorKind::Usage,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// REST result type
pub type HttpResult<T> = Result<T, HttpError>;
