//! Identify handler (op 2)

use std::sync::Arc;

use concord_core::{Guild, User};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use super::{guild_payload, HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::events::{
    event_data, GatewayEventType, ReadyEvent, RelationshipPayload, UnavailableGuild,
    UserPayload, UserReadyExtras,
};
use crate::presence::Presence;
use crate::protocol::IdentifyPayload;
use crate::server::GatewayState;
use crate::session::{Session, SessionSeed, ShardInfo};

/// Handles identify messages
pub struct IdentifyHandler;

impl IdentifyHandler {
    /// Authenticate, create a session and send READY
    pub async fn handle(connection: &mut Connection, data: &Value) -> HandlerResult<()> {
        if connection.is_identified() {
            return Err(HandlerError::AlreadyAuthenticated);
        }

        let payload = IdentifyPayload::deserialize(data)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;
        payload
            .validate()
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        let state = connection.state().clone();
        let limits = &state.config().session;

        let user = state
            .users()
            .find_by_token(&payload.token)
            .await?
            .ok_or(HandlerError::AuthenticationFailed)?;

        let shard = ShardInfo::parse(payload.shard.as_ref())?;
        if shard.is_sharded() && !user.is_bot() {
            return Err(HandlerError::InvalidShard(
                "User accounts cannot shard".to_string(),
            ));
        }

        let guild_count = state.guilds().count_by_user(user.id).await?;
        if user.is_bot() && !shard.is_sharded() && guild_count > limits.max_guilds_per_shard {
            return Err(HandlerError::ShardingRequired);
        }

        let guilds = state.guilds().find_by_user(user.id).await?;
        let owned: Vec<&Guild> = guilds.iter().filter(|g| shard.owns(g.id)).collect();
        if owned.len() > limits.max_guilds_per_shard {
            return Err(HandlerError::InvalidShard(format!(
                "Shard {} would hold {} guilds",
                shard.shard_id,
                owned.len()
            )));
        }

        let seed = SessionSeed {
            token: payload.token.clone(),
            user: user.clone(),
            shard,
            large_threshold: payload.large_threshold.unwrap_or(limits.large_threshold),
            properties: payload.properties.clone(),
            replay_capacity: limits.replay_capacity,
        };
        let sink = connection.sink().clone();
        let session = state
            .registry()
            .register(connection.id(), move |id| Session::new(id, seed, sink))?;
        connection.attach_session(Arc::clone(&session));

        // Presence goes online before the guild snapshot so the snapshot
        // already carries it
        state
            .presence()
            .global_update(user.id, &guilds, Presence::online())
            .await;

        let payloads: Vec<_> = owned
            .iter()
            .map(|guild| guild_payload(state.presence(), guild, session.large_threshold()))
            .collect();

        let ready_guilds = if user.is_bot() {
            owned
                .iter()
                .map(|guild| event_data(&UnavailableGuild::new(guild.id)))
                .collect()
        } else {
            payloads.iter().map(event_data).collect()
        };

        let private = if user.is_bot() {
            None
        } else {
            Some(user_extras(&state, &user).await?)
        };

        let ready = ReadyEvent {
            v: state.config().gateway.version,
            user: UserPayload::private(&user),
            private_channels: Vec::new(),
            guilds: ready_guilds,
            session_id: session.id().to_string(),
            shard: shard.as_pair(),
            trace: vec![connection.trace("ready")],
            private,
        };
        session
            .push_owned(connection.sink(), GatewayEventType::Ready, event_data(&ready))
            .await?;
        session.mark_ready();

        for payload in payloads.iter().filter(|p| !p.large) {
            state.watchers().mark(payload.id, user.id);
            session.watch(payload.id);
        }

        if user.is_bot() {
            for payload in &payloads {
                session
                    .push_owned(connection.sink(), GatewayEventType::GuildCreate, event_data(payload))
                    .await?;
            }
        }

        tracing::info!(
            connection_id = connection.id(),
            session_id = %session.id(),
            user_id = %user.id,
            bot = user.is_bot(),
            shard = ?shard.as_pair(),
            guilds = payloads.len(),
            "Session identified"
        );

        Ok(())
    }
}

/// READY fields only user accounts receive
async fn user_extras(state: &GatewayState, user: &User) -> HandlerResult<UserReadyExtras> {
    let relationships = state.relationships().relationships_for_user(user.id).await?;
    let friends = relationships
        .iter()
        .filter(|rel| rel.is_friend())
        .map(|rel| rel.user.id);

    Ok(UserReadyExtras {
        presences: state.presence().global_presences(friends),
        relationships: relationships.iter().map(RelationshipPayload::from).collect(),
        user_settings: state.settings().settings_for_user(user.id).await?,
        user_guild_settings: state.settings().guild_settings_for_user(user.id).await?,
        read_state: state.settings().read_state_for_user(user.id).await?,
        connected_accounts: Vec::new(),
        notes: Vec::new(),
    })
}
