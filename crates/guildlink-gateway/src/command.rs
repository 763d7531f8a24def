//! Outgoing gateway commands
//!
//! Only the commands in [`Command::ALLOWED`] can be emitted by users;
//! heartbeat, identify and resume are driven by the connection itself and
//! are rejected here like any other unknown name.

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{
    GatewayMessage, OpCode, RequestGuildMembers, UpdateStatus, UpdateVoiceState,
};
use guildlink_core::Snowflake;
use serde_json::Value;

pub const UPDATE_STATUS: &str = "UPDATE_STATUS";
pub const UPDATE_VOICE_STATE: &str = "UPDATE_VOICE_STATE";
pub const REQUEST_GUILD_MEMBERS: &str = "REQUEST_GUILD_MEMBERS";

/// A validated command ready to be queued on a shard
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpdateStatus(UpdateStatus),
    UpdateVoiceState(UpdateVoiceState),
    RequestGuildMembers(RequestGuildMembers),
}

impl Command {
    pub const ALLOWED: [&'static str; 3] = [UPDATE_STATUS, UPDATE_VOICE_STATE, REQUEST_GUILD_MEMBERS];

    /// Validate a command given by name and JSON body
    pub fn from_raw(name: &str, data: Value) -> GatewayResult<Self> {
        let invalid = |e: serde_json::Error| GatewayError::InvalidCommand {
            command: name.to_string(),
            reason: e.to_string(),
        };

        let command = match name {
            UPDATE_STATUS => Self::UpdateStatus(serde_json::from_value(data).map_err(invalid)?),
            UPDATE_VOICE_STATE => {
                Self::UpdateVoiceState(serde_json::from_value(data).map_err(invalid)?)
            }
            REQUEST_GUILD_MEMBERS => {
                Self::RequestGuildMembers(serde_json::from_value(data).map_err(invalid)?)
            }
            other => return Err(GatewayError::UnsupportedCommand(other.to_string())),
        };
        command.validate()?;
        Ok(command)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        let reason = match self {
            Self::UpdateStatus(status) if !status.is_valid_status() => {
                format!("unknown status {:?}", status.status)
            }
            Self::UpdateVoiceState(state) if state.guild_id.is_zero() => {
                "guild_id is required".to_string()
            }
            Self::RequestGuildMembers(request) if request.guild_id.is_zero() => {
                "guild_id is required".to_string()
            }
            Self::RequestGuildMembers(request)
                if request.query.is_some() && request.user_ids.is_some() =>
            {
                "query and user_ids are mutually exclusive".to_string()
            }
            _ => return Ok(()),
        };
        Err(GatewayError::InvalidCommand {
            command: self.name().to_string(),
            reason,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateStatus(_) => UPDATE_STATUS,
            Self::UpdateVoiceState(_) => UPDATE_VOICE_STATE,
            Self::RequestGuildMembers(_) => REQUEST_GUILD_MEMBERS,
        }
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            Self::UpdateStatus(_) => OpCode::StatusUpdate,
            Self::UpdateVoiceState(_) => OpCode::VoiceStateUpdate,
            Self::RequestGuildMembers(_) => OpCode::RequestGuildMembers,
        }
    }

    /// Guild that decides which shard the command goes to
    ///
    /// `None` means the command is sent on every shard.
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::UpdateStatus(_) => None,
            Self::UpdateVoiceState(state) => Some(state.guild_id),
            Self::RequestGuildMembers(request) => Some(request.guild_id),
        }
    }

    pub fn to_message(&self) -> GatewayResult<GatewayMessage> {
        let message = match self {
            Self::UpdateStatus(status) => GatewayMessage::new(self.opcode(), status)?,
            Self::UpdateVoiceState(state) => GatewayMessage::new(self.opcode(), state)?,
            Self::RequestGuildMembers(request) => GatewayMessage::new(self.opcode(), request)?,
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildlink_common::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_allowed_commands_parse() {
        let status = Command::from_raw(UPDATE_STATUS, json!({"since": null, "status": "idle"}))
            .unwrap();
        assert_eq!(status.opcode(), OpCode::StatusUpdate);
        assert_eq!(status.guild_id(), None);

        let voice = Command::from_raw(
            UPDATE_VOICE_STATE,
            json!({"guild_id": "41771983423143937", "channel_id": "127121515262115840"}),
        )
        .unwrap();
        assert_eq!(voice.guild_id(), Some(Snowflake::new(41_771_983_423_143_937)));

        let members = Command::from_raw(REQUEST_GUILD_MEMBERS, json!({"guild_id": "9", "query": ""}))
            .unwrap();
        assert_eq!(members.to_message().unwrap().op, OpCode::RequestGuildMembers);
    }

    #[test]
    fn test_internal_and_unknown_commands_rejected() {
        for name in ["HEARTBEAT", "IDENTIFY", "RESUME", "PLAY_MUSIC"] {
            let err = Command::from_raw(name, json!({})).unwrap_err();
            assert!(matches!(err, GatewayError::UnsupportedCommand(ref n) if n == name));
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
    }

    #[test]
    fn test_invalid_data_is_usage_error() {
        let err = Command::from_raw(UPDATE_STATUS, json!({"status": "busy"})).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCommand { .. }));
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = Command::from_raw(REQUEST_GUILD_MEMBERS, json!({"guild_id": "0"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = Command::from_raw(
            REQUEST_GUILD_MEMBERS,
            json!({"guild_id": "1", "query": "a", "user_ids": ["2"]}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        assert!(Command::from_raw(UPDATE_VOICE_STATE, json!("nope")).is_err());
    }
}
