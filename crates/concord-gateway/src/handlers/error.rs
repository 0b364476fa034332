//! Handler error types
//!
//! Every way a handler can end a connection. The receive loop turns the
//! error into a close exactly once.

use concord_core::DomainError;
use thiserror::Error;

use crate::connection::DeliveryError;
use crate::protocol::{CloseCode, CloseReason, CodecError, OpCode};
use crate::session::{RegistryError, ShardError};

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Frame could not be decoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Payload failed schema validation
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Op the server does not serve
    #[error("Unknown opcode {0}")]
    UnknownOpcode(OpCode),

    /// Session-scoped op before IDENTIFY
    #[error("Not authenticated")]
    NotAuthenticated,

    /// IDENTIFY or RESUME on an identified connection
    #[error("Already authenticated")]
    AlreadyAuthenticated,

    /// Token did not resolve to a user
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Shard claim was malformed or over capacity
    #[error("Invalid shard: {0}")]
    InvalidShard(String),

    /// Bot holds too many guilds to run unsharded
    #[error("Sharding required")]
    ShardingRequired,

    /// No session id could be allocated
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// RESUME refused; INVALID_SESSION precedes the close
    #[error("Session invalidated: {reason}")]
    SessionInvalidated {
        resumable: bool,
        reason: String,
        close: CloseReason,
    },

    /// Aggregate inbound rate exceeded
    #[error("Rate limited")]
    RateLimited,

    /// Own event could not be queued
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// Collaborator failure
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl From<ShardError> for HandlerError {
    fn from(err: ShardError) -> Self {
        Self::InvalidShard(err.to_string())
    }
}

impl HandlerError {
    pub fn invalidated(resumable: bool, reason: impl Into<String>) -> Self {
        Self::SessionInvalidated {
            resumable,
            reason: reason.into(),
            close: CloseReason::invalidated(),
        }
    }

    /// Non-resumable refusal of a sequence the session cannot replay
    pub fn invalid_sequence(reason: impl Into<String>) -> Self {
        Self::SessionInvalidated {
            resumable: false,
            reason: reason.into(),
            close: CloseReason::invalid_sequence(),
        }
    }

    /// Convert to the close sent to the client
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Self::Codec(err) => err.close_reason(),
            Self::InvalidPayload(_) => CloseCode::DecodeError.into(),
            Self::UnknownOpcode(op) => {
                CloseReason::new(CloseCode::UnknownOpcode, format!("Unknown opcode {}", op.as_u8()))
            }
            Self::NotAuthenticated => CloseCode::NotAuthenticated.into(),
            Self::AlreadyAuthenticated => CloseCode::AlreadyAuthenticated.into(),
            Self::AuthenticationFailed => CloseCode::AuthenticationFailed.into(),
            Self::InvalidShard(reason) => CloseReason::new(CloseCode::InvalidShard, reason.clone()),
            Self::ShardingRequired => CloseCode::ShardingRequired.into(),
            Self::Registry(_) => CloseCode::SessionTimeout.into(),
            Self::SessionInvalidated { close, .. } => close.clone(),
            Self::RateLimited => CloseCode::RateLimited.into(),
            Self::Delivery(DeliveryError::Full) => CloseReason::slow_consumer(),
            Self::Delivery(DeliveryError::Superseded) => CloseReason::superseded(),
            Self::Delivery(DeliveryError::Closed) | Self::Domain(_) => {
                CloseCode::UnknownError.into()
            }
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
