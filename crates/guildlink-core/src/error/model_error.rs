use thiserror::Error;

use crate::value_objects::SnowflakeParseError;

/// Errors raised while decoding or patching model types
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("patch payload must be a JSON object")]
    NotAnObject,

    #[error(transparent)]
    InvalidSnowflake(#[from] SnowflakeParseError),

    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
