//! Wire codec
//!
//! JSON travels in text frames, MessagePack in binary frames. The payload
//! ceiling is enforced on the raw frame before any parsing happens.

use serde::Deserialize;
use serde_json::Value;

use super::{CloseCode, CloseReason, GatewayMessage, OpCode};

/// Negotiated payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Json,
    MsgPack,
}

impl Encoding {
    /// Parse the `encoding` query parameter
    #[must_use]
    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "json" => Some(Self::Json),
            "msgpack" => Some(Self::MsgPack),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::MsgPack => "msgpack",
        }
    }
}

/// A data frame as it crosses the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Size of the frame body in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Codec failures
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("expected a {expected} frame")]
    WrongFrameKind { expected: &'static str },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unknown op code {0}")]
    UnknownOpcode(u64),

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

impl CodecError {
    /// Close reason for an inbound decoding failure
    #[must_use]
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Self::UnknownOpcode(op) => {
                CloseReason::new(CloseCode::UnknownOpcode, format!("Unknown opcode {op}"))
            }
            Self::PayloadTooLarge { .. } => {
                CloseReason::new(CloseCode::DecodeError, "Payload too large")
            }
            Self::Encode(_) => CloseCode::UnknownError.into(),
            Self::WrongFrameKind { .. } | Self::Malformed(_) => CloseCode::DecodeError.into(),
        }
    }
}

/// Envelope as it arrives from a client; `op` stays numeric so unknown
/// values can be told apart from malformed ones
#[derive(Deserialize)]
struct RawMessage {
    op: u64,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Value,
}

impl TryFrom<RawMessage> for GatewayMessage {
    type Error = CodecError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let op = u8::try_from(raw.op)
            .ok()
            .and_then(OpCode::from_u8)
            .ok_or(CodecError::UnknownOpcode(raw.op))?;
        Ok(Self {
            op,
            s: raw.s,
            t: raw.t,
            d: raw.d,
        })
    }
}

/// Per-connection encoder/decoder
#[derive(Debug, Clone, Copy)]
pub struct GatewayCodec {
    encoding: Encoding,
    max_payload: usize,
}

impl GatewayCodec {
    #[must_use]
    pub fn new(encoding: Encoding, max_payload: usize) -> Self {
        Self {
            encoding,
            max_payload,
        }
    }

    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Encode an outbound envelope
    pub fn encode(&self, message: &GatewayMessage) -> Result<Frame, CodecError> {
        match self.encoding {
            Encoding::Json => serde_json::to_string(message)
                .map(Frame::Text)
                .map_err(|e| CodecError::Encode(e.to_string())),
            Encoding::MsgPack => rmp_serde::to_vec_named(message)
                .map(Frame::Binary)
                .map_err(|e| CodecError::Encode(e.to_string())),
        }
    }

    /// Decode an inbound frame
    pub fn decode(&self, frame: &Frame) -> Result<GatewayMessage, CodecError> {
        if frame.len() > self.max_payload {
            return Err(CodecError::PayloadTooLarge {
                size: frame.len(),
                max: self.max_payload,
            });
        }

        let raw: RawMessage = match (self.encoding, frame) {
            (Encoding::Json, Frame::Text(text)) => {
                serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))?
            }
            (Encoding::MsgPack, Frame::Binary(bytes)) => {
                rmp_serde::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?
            }
            (Encoding::Json, Frame::Binary(_)) => {
                return Err(CodecError::WrongFrameKind { expected: "text" })
            }
            (Encoding::MsgPack, Frame::Text(_)) => {
                return Err(CodecError::WrongFrameKind { expected: "binary" })
            }
        };

        raw.try_into()
    }
}
