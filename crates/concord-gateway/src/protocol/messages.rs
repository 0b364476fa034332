//! Gateway message format
//!
//! Every envelope carries exactly four fields. `s` and `t` are only
//! populated for DISPATCH; they serialize as `null` otherwise.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{HelloPayload, OpCode};

/// Gateway message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default)]
    pub s: Option<u64>,

    /// Event name (only for op=0 Dispatch)
    #[serde(default)]
    pub t: Option<String>,

    /// Event data payload
    #[serde(default)]
    pub d: Value,
}

impl GatewayMessage {
    /// Envelope with no sequence or event name
    #[must_use]
    pub fn new(op: OpCode, d: Value) -> Self {
        Self { op, s: None, t: None, d }
    }

    // === Server Messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            s: Some(sequence),
            t: Some(event_type.into()),
            d: data,
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(payload: &HelloPayload) -> Self {
        Self::new(
            OpCode::Hello,
            json!({
                "heartbeat_interval": payload.heartbeat_interval,
                "_trace": payload.trace,
            }),
        )
    }

    /// Create a Heartbeat ACK message (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, Value::Null)
    }

    /// Create an Invalid Session message (op=9)
    ///
    /// `resumable` indicates if the session can be resumed.
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing Client Messages ===

    /// Sequence acknowledged by a heartbeat (op=1); `null` means none yet
    #[must_use]
    pub fn heartbeat_seq(&self) -> Option<u64> {
        self.d.as_u64()
    }

    /// Check if this is a dispatch carrying the given event name
    #[must_use]
    pub fn is_event(&self, name: &str) -> bool {
        self.op == OpCode::Dispatch && self.t.as_deref() == Some(name)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
