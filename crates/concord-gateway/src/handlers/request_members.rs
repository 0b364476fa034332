//! Request guild members handler (op 8)

use serde::Deserialize;
use serde_json::Value;

use super::{HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::events::{event_data, GatewayEventType, MemberPayload, MembersChunkEvent};
use crate::protocol::RequestGuildMembersPayload;

/// Handles guild member requests
pub struct RequestMembersHandler;

impl RequestMembersHandler {
    /// Answer with GUILD_MEMBERS_CHUNK events
    ///
    /// An empty `query` matches every member. Requests for guilds the
    /// user is not in are ignored.
    pub async fn handle(connection: &mut Connection, data: &Value) -> HandlerResult<()> {
        let session = connection.require_session()?;
        let payload = RequestGuildMembersPayload::deserialize(data)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        let state = connection.state();
        let chunk_size = state.config().session.member_chunk_size.max(1);
        let limit = clamp_limit(payload.limit, chunk_size);

        let Some(guild) = state.guilds().find_by_id(payload.guild_id).await? else {
            return Ok(());
        };
        if !guild.has_member(session.user_id()) {
            tracing::debug!(
                user_id = %session.user_id(),
                guild_id = %guild.id,
                "Member request for a guild the user is not in"
            );
            return Ok(());
        }

        let matches: Vec<MemberPayload> = guild
            .members
            .iter()
            .filter(|member| payload.query.is_empty() || member.user.username_starts_with(&payload.query))
            .map(MemberPayload::from)
            .collect();

        for members in split_members(matches, limit, chunk_size) {
            let chunk = MembersChunkEvent {
                guild_id: guild.id,
                members,
            };
            session
                .push_owned(
                    connection.sink(),
                    GatewayEventType::GuildMembersChunk,
                    event_data(&chunk),
                )
                .await?;
        }
        Ok(())
    }
}

/// Limits outside `1..=chunk_size` fall back to the chunk size
fn clamp_limit(limit: i64, chunk_size: usize) -> usize {
    match usize::try_from(limit) {
        Ok(limit) if limit > 0 && limit <= chunk_size => limit,
        _ => chunk_size,
    }
}

/// Result sets larger than one chunk are streamed whole; smaller ones
/// are truncated to the limit
fn split_members(mut members: Vec<MemberPayload>, limit: usize, chunk_size: usize) -> Vec<Vec<MemberPayload>> {
    if members.len() > chunk_size {
        let mut chunks = Vec::with_capacity(members.len().div_ceil(chunk_size));
        while !members.is_empty() {
            let rest = members.split_off(chunk_size.min(members.len()));
            chunks.push(std::mem::replace(&mut members, rest));
        }
        chunks
    } else {
        members.truncate(limit);
        vec![members]
    }
}
