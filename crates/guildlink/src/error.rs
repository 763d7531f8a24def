//! Client error type

use crate::demux::{ChannelError, RegistrationError};
use guildlink_cache::CacheError;
use guildlink_common::{ConfigError, ErrorKind};
use guildlink_gateway::GatewayError;
use guildlink_http::HttpError;
use thiserror::Error;

/// Errors returned by [`crate::Client`]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("rest error: {0}")]
    Http(#[from] HttpError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("invalid registration: {0}")]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("client is already connected")]
    AlreadyConnected,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Gateway(e) => e.kind(),
            Self::Http(e) => e.kind(),
            Self::Cache(e) => e.kind(),
            Self::Registration(e) => e.kind(),
            Self::Channel(_) | Self::AlreadyConnected => ErrorKind::Usage,
        }
    }
}

/// Client result type
pub type ClientResult<T> = Result<T, ClientError>;
