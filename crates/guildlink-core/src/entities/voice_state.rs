//! Voice state - a user's connection to a voice channel

use serde::{Deserialize, Serialize};

use crate::entities::Member;
use crate::value_objects::Snowflake;

/// Voice state entity
///
/// A `channel_id` of `None` means the user left voice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    pub session_id: String,
    pub deaf: bool,
    pub mute: bool,
    pub self_deaf: bool,
    pub self_mute: bool,
    pub self_stream: bool,
    pub suppress: bool,
}

impl VoiceState {
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }
}
