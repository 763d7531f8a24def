//! Cache errors

use guildlink_common::ErrorKind;
use guildlink_core::{EventName, ModelError};
use thiserror::Error;

/// Errors raised while applying an event to the cache
///
/// Only decode failures surface; merge failures are logged and the decoded
/// event is still returned.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to decode {event} payload: {source}")]
    Decode {
        event: EventName,
        #[source]
        source: ModelError,
    },
}

impl CacheError {
    pub(crate) fn decode(event: EventName, source: impl Into<ModelError>) -> Self {
        Self::Decode {
            event,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } => ErrorKind::Protocol,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
