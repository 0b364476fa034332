//! Resume handler (op 6)

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use super::{HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::presence::Presence;
use crate::protocol::{CloseReason, ResumePayload};
use crate::session::ResumeRejection;

/// Handles resume messages
pub struct ResumeHandler;

impl ResumeHandler {
    /// Re-attach an existing session to this connection
    ///
    /// Anything that prevents the resume ends in a non-resumable
    /// INVALID_SESSION. A sequence the buffer cannot serve also destroys
    /// the session and closes with "invalid sequence".
    pub async fn handle(connection: &mut Connection, data: &Value) -> HandlerResult<()> {
        if connection.is_identified() {
            return Err(HandlerError::AlreadyAuthenticated);
        }

        let payload = ResumePayload::deserialize(data)
            .map_err(|e| HandlerError::invalidated(false, e.to_string()))?;
        payload
            .validate()
            .map_err(|e| HandlerError::invalidated(false, e.to_string()))?;

        let state = connection.state().clone();
        let session = state
            .registry()
            .get(&payload.session_id)
            .ok_or_else(|| HandlerError::invalidated(false, "unknown session"))?;

        if !state.registry().token_matches(&payload.token, &payload.session_id) {
            return Err(HandlerError::invalidated(false, "token mismatch"));
        }

        let user_id = session.user_id();
        let was_online = state.registry().is_online(user_id);

        let summary = match session
            .resume_onto(
                connection.sink(),
                payload.seq,
                state.registry(),
                &connection.trace("resume"),
            )
            .await
        {
            Ok(summary) => summary,
            Err(ResumeRejection::Delivery(e)) => return Err(e.into()),
            Err(rejection @ ResumeRejection::Unregistered) => {
                return Err(HandlerError::invalidated(false, rejection.to_string()));
            }
            Err(rejection) => {
                tracing::info!(
                    connection_id = connection.id(),
                    session_id = %session.id(),
                    reason = %rejection,
                    "Resume rejected, dropping session"
                );
                state.registry().invalidate(session.id());
                session.kick_attached(CloseReason::invalidated()).await;
                state.settle_presence(user_id).await;
                return Err(HandlerError::invalid_sequence(rejection.to_string()));
            }
        };

        connection.attach_session(Arc::clone(&session));
        for guild_id in session.watched_guilds() {
            state.watchers().mark(guild_id, user_id);
        }

        if !was_online {
            let guilds = state.guilds().find_by_user(user_id).await?;
            state
                .presence()
                .global_update(user_id, &guilds, Presence::online())
                .await;
        }

        tracing::info!(
            connection_id = connection.id(),
            session_id = %session.id(),
            user_id = %user_id,
            replayed = summary.replayed,
            presences = summary.presences,
            seq = summary.sent_seq,
            "Session resumed"
        );

        Ok(())
    }
}
