//! Op code handlers
//!
//! Routes incoming client messages to the handler for their op code.

mod error;
mod guild_sync;
mod guilds;
mod heartbeat;
mod identify;
mod request_members;
mod resume;
mod status;

pub use error::{HandlerError, HandlerResult};
pub use guild_sync::GuildSyncHandler;
pub use guilds::{guild_payload, online_members};
pub use heartbeat::HeartbeatHandler;
pub use identify::IdentifyHandler;
pub use request_members::RequestMembersHandler;
pub use resume::ResumeHandler;
pub use status::StatusHandler;

use crate::connection::Connection;
use crate::protocol::{GatewayMessage, OpCode};

/// Routes client messages to their handlers
pub struct OpRouter;

impl OpRouter {
    /// Handle an incoming client message
    pub async fn route(connection: &mut Connection, message: GatewayMessage) -> HandlerResult<()> {
        let op = message.op;

        // Voice is not served here; server-only ops are never valid inbound
        if !op.is_client_op() || matches!(op, OpCode::VoiceStateUpdate | OpCode::VoiceServerPing) {
            tracing::warn!(connection_id = connection.id(), op = %op, "Unsupported op code from client");
            return Err(HandlerError::UnknownOpcode(op));
        }

        if !connection.is_identified()
            && !matches!(op, OpCode::Heartbeat | OpCode::Identify | OpCode::Resume)
        {
            return Err(HandlerError::NotAuthenticated);
        }

        match op {
            OpCode::Heartbeat => HeartbeatHandler::handle(connection, message.heartbeat_seq()).await,
            OpCode::Identify => IdentifyHandler::handle(connection, &message.d).await,
            OpCode::Resume => ResumeHandler::handle(connection, &message.d).await,
            OpCode::StatusUpdate => StatusHandler::handle(connection, &message.d).await,
            OpCode::RequestGuildMembers => {
                RequestMembersHandler::handle(connection, &message.d).await
            }
            OpCode::GuildSync => GuildSyncHandler::handle(connection, &message.d).await,
            OpCode::Dispatch
            | OpCode::VoiceStateUpdate
            | OpCode::VoiceServerPing
            | OpCode::Reconnect
            | OpCode::InvalidSession
            | OpCode::Hello
            | OpCode::HeartbeatAck => Err(HandlerError::UnknownOpcode(op)),
        }
    }
}
