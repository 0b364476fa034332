//! Gateway state
//!
//! Application state shared by every connection and HTTP route.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use concord_common::AppConfig;
use concord_core::{
    GuildRepository, RelationshipRepository, SettingsRepository, Snowflake, UserRepository,
};

use crate::connection::ConnectionId;
use crate::dispatch::{Dispatcher, WatcherSet};
use crate::presence::{Presence, PresenceManager};
use crate::session::SessionRegistry;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    config: Arc<AppConfig>,
    users: Arc<dyn UserRepository>,
    guilds: Arc<dyn GuildRepository>,
    settings: Arc<dyn SettingsRepository>,
    relationships: Arc<dyn RelationshipRepository>,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
    presence: Arc<PresenceManager>,
    next_connection: Arc<AtomicU64>,
}

impl GatewayState {
    /// Create a gateway state over a store implementing every port
    pub fn new<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: UserRepository
            + GuildRepository
            + SettingsRepository
            + RelationshipRepository
            + 'static,
    {
        let registry = Arc::new(SessionRegistry::new(config.session.session_id_attempts));
        Self::with_registry(config, store, registry)
    }

    /// Same as `new`, with a caller-built registry
    pub fn with_registry<S>(config: AppConfig, store: Arc<S>, registry: Arc<SessionRegistry>) -> Self
    where
        S: UserRepository
            + GuildRepository
            + SettingsRepository
            + RelationshipRepository
            + 'static,
    {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::new(WatcherSet::new()),
        ));
        let presence = Arc::new(PresenceManager::new(Arc::clone(&dispatcher)));

        Self {
            config: Arc::new(config),
            users: store.clone(),
            guilds: store.clone(),
            settings: store.clone(),
            relationships: store,
            registry,
            dispatcher,
            presence,
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn guilds(&self) -> &dyn GuildRepository {
        self.guilds.as_ref()
    }

    pub fn settings(&self) -> &dyn SettingsRepository {
        self.settings.as_ref()
    }

    pub fn relationships(&self) -> &dyn RelationshipRepository {
        self.relationships.as_ref()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn watchers(&self) -> &WatcherSet {
        self.dispatcher.watchers()
    }

    pub fn presence(&self) -> &PresenceManager {
        &self.presence
    }

    /// Allocate an id for a new connection
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Broadcast a user as offline once none of their sessions has a
    /// connection; a no-op if they are already offline
    pub async fn settle_presence(&self, user_id: Snowflake) {
        if self.registry.is_online(user_id) || self.presence.global(user_id).status.is_offline() {
            return;
        }
        match self.guilds.find_by_user(user_id).await {
            Ok(guilds) => {
                self.presence
                    .global_update(user_id, &guilds, Presence::offline())
                    .await;
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not load guilds for offline presence");
            }
        }
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("sessions", &self.registry.len())
            .field("config", &"AppConfig")
            .finish()
    }
}
