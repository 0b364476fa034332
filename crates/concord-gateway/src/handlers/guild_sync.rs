//! Guild sync handler (op 12)

use concord_core::Snowflake;
use serde_json::Value;

use super::{online_members, HandlerResult};
use crate::connection::Connection;
use crate::events::{event_data, GatewayEventType, GuildSyncEvent};

/// Handles guild sync messages
pub struct GuildSyncHandler;

impl GuildSyncHandler {
    /// Start watching the listed guilds and send a GUILD_SYNC for each
    ///
    /// `data` must be a list of guild ids; anything else is ignored, as are
    /// ids of guilds the user is not a member of.
    pub async fn handle(connection: &mut Connection, data: &Value) -> HandlerResult<()> {
        let session = connection.require_session()?;
        let Some(ids) = data.as_array() else {
            tracing::debug!(connection_id = connection.id(), "Ignoring guild sync without a list");
            return Ok(());
        };

        let state = connection.state();
        let user_id = session.user_id();

        for raw in ids {
            let Ok(guild_id) = serde_json::from_value::<Snowflake>(raw.clone()) else {
                continue;
            };
            let Some(guild) = state.guilds().find_by_id(guild_id).await? else {
                continue;
            };
            if !guild.has_member(user_id) {
                continue;
            }

            state.watchers().mark(guild.id, user_id);
            session.watch(guild.id);

            let sync = GuildSyncEvent {
                id: guild.id,
                presences: state.presence().guild_presences(&guild),
                members: online_members(state.presence(), &guild),
            };
            session
                .push_owned(connection.sink(), GatewayEventType::GuildSync, event_data(&sync))
                .await?;
        }
        Ok(())
    }
}
