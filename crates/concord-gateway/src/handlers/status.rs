//! Status update handler (op 3)

use serde::Deserialize;
use serde_json::Value;

use super::HandlerResult;
use crate::connection::Connection;
use crate::presence::Presence;
use crate::protocol::StatusUpdatePayload;

/// Handles status update messages
pub struct StatusHandler;

impl StatusHandler {
    /// Apply the client's new presence to every guild it is in
    ///
    /// Malformed updates are ignored without closing the connection.
    pub async fn handle(connection: &mut Connection, data: &Value) -> HandlerResult<()> {
        let session = connection.require_session()?;

        let Ok(payload) = StatusUpdatePayload::deserialize(data) else {
            tracing::debug!(connection_id = connection.id(), "Ignoring malformed status update");
            return Ok(());
        };
        let Some(presence) = Presence::from_update(&payload) else {
            tracing::debug!(connection_id = connection.id(), "Ignoring incomplete status update");
            return Ok(());
        };

        let state = connection.state();
        let guilds = state.guilds().find_by_user(session.user_id()).await?;
        let changed = state
            .presence()
            .global_update(session.user_id(), &guilds, presence.clone())
            .await;

        tracing::debug!(
            user_id = %session.user_id(),
            status = %presence.status,
            guilds = changed,
            "Presence updated"
        );
        Ok(())
    }
}
