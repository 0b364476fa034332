//! Client payload definitions
//!
//! Typed `d` payloads for the ops the gateway serves. Type mismatches fail
//! deserialization; field constraints are checked with `validator`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use concord_core::Snowflake;

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
    /// Diagnostic identifiers of the serving node
    #[serde(rename = "_trace")]
    pub trace: Vec<String>,
}

impl HelloPayload {
    #[must_use]
    pub fn new(heartbeat_interval: u64, trace: impl Into<String>) -> Self {
        Self {
            heartbeat_interval,
            trace: vec![trace.into()],
        }
    }
}

/// Payload for op 2 (Identify)
///
/// `shard` stays untyped here: a malformed shard closes with "invalid shard",
/// not "decode error", so it is parsed separately.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdentifyPayload {
    #[validate(length(min = 1, message = "token must not be empty"))]
    pub token: String,

    /// Client properties ($os, $browser, $device, ...)
    pub properties: Map<String, Value>,

    #[serde(default)]
    pub compress: Option<bool>,

    #[serde(default)]
    #[validate(range(min = 1, message = "large_threshold must be positive"))]
    pub large_threshold: Option<u32>,

    #[serde(default)]
    pub shard: Option<Value>,
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResumePayload {
    #[validate(length(min = 1))]
    pub token: String,

    #[validate(length(min = 1))]
    pub session_id: String,

    /// Last sequence number the client received
    pub seq: u64,
}

/// Activity descriptor inside a status update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<u8>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Payload for op 3 (Status Update)
///
/// `status` and `afk` are required by the protocol, but a payload missing
/// them is ignored rather than rejected, so both are optional here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdatePayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub afk: Option<bool>,
    #[serde(default)]
    pub since: Option<Value>,
    #[serde(default)]
    pub idle_since: Option<Value>,
    #[serde(default)]
    pub game: Option<GamePayload>,
}

impl StatusUpdatePayload {
    /// Whether the client reports being away
    #[must_use]
    pub fn is_away(&self) -> bool {
        let set = |v: &Option<Value>| v.as_ref().is_some_and(|v| !v.is_null() && v != &Value::from(0));
        self.afk == Some(true) || set(&self.since) || set(&self.idle_since)
    }
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,
    pub query: String,
    pub limit: i64,
}
