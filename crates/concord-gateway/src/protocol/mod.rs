//! Gateway protocol definitions
//!
//! Defines the wire protocol: op codes, the envelope format, client payloads,
//! close codes, and the JSON / MessagePack codec.

mod close_codes;
mod codec;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, CloseReason};
pub use codec::{CodecError, Encoding, Frame, GatewayCodec};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    GamePayload, HelloPayload, IdentifyPayload, RequestGuildMembersPayload, ResumePayload,
    StatusUpdatePayload,
};
