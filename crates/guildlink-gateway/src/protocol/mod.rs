//! Gateway protocol definitions
//!
//! Op codes, close codes, the frame format, intents and the payloads the
//! client sends.

mod close_codes;
mod intents;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use intents::Intents;
pub use messages::{GatewayMessage, RawFrame};
pub use opcodes::{OpCode, VoiceOpCode};
pub(crate) use payloads::ReadySession;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, RequestGuildMembers, ResumePayload,
    UpdateStatus, UpdateVoiceState,
};
