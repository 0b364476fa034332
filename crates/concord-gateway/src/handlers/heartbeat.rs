//! Heartbeat handler (op 1)

use super::HandlerResult;
use crate::connection::Connection;
use crate::protocol::GatewayMessage;

/// Handles heartbeat messages
pub struct HeartbeatHandler;

impl HeartbeatHandler {
    /// Re-arm the timer, record the acknowledged sequence and reply
    ///
    /// `last_sequence` is the client's last received sequence number, or
    /// `None` before it has seen any dispatch.
    pub async fn handle(
        connection: &mut Connection,
        last_sequence: Option<u64>,
    ) -> HandlerResult<()> {
        connection.beat();

        if let (Some(seq), Some(session)) = (last_sequence, connection.session()) {
            session.acknowledge(seq).await;
        }

        tracing::trace!(
            connection_id = connection.id(),
            client_seq = ?last_sequence,
            "Heartbeat received"
        );

        connection.sink().send(GatewayMessage::heartbeat_ack()).await?;
        Ok(())
    }
}
