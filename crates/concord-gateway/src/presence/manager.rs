//! Presence manager

use std::sync::Arc;

use concord_core::{Guild, GuildMember, Snowflake};
use dashmap::DashMap;

use super::{Presence, Status};
use crate::dispatch::{DispatchScope, Dispatcher};
use crate::events::{event_data, GatewayEventType, PresencePayload, PresenceUser};

/// Holds every known presence and broadcasts changes
pub struct PresenceManager {
    /// Keyed by `(guild_id, user_id)`; offline entries are removed
    guilds: DashMap<(Snowflake, Snowflake), Presence>,
    /// Cross-guild presence per user
    global: DashMap<Snowflake, Presence>,
    dispatcher: Arc<Dispatcher>,
}

impl PresenceManager {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            guilds: DashMap::new(),
            global: DashMap::new(),
            dispatcher,
        }
    }

    /// Current global presence of a user
    pub fn global(&self, user_id: Snowflake) -> Presence {
        self.global
            .get(&user_id)
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }

    /// Current presence of a user inside one guild
    pub fn in_guild(&self, guild_id: Snowflake, user_id: Snowflake) -> Presence {
        self.guilds
            .get(&(guild_id, user_id))
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }

    pub fn is_online_in(&self, guild_id: Snowflake, user_id: Snowflake) -> bool {
        !self.in_guild(guild_id, user_id).status.is_offline()
    }

    /// Non-offline presences of a guild's members, in member order
    pub fn guild_presences(&self, guild: &Guild) -> Vec<PresencePayload> {
        guild
            .members
            .iter()
            .filter_map(|member| {
                let presence = self.guilds.get(&(guild.id, member.user_id()))?;
                Some(Self::payload(Some(guild.id), member, presence.value()))
            })
            .collect()
    }

    /// Global presences for a set of users, skipping offline ones
    pub fn global_presences(
        &self,
        user_ids: impl IntoIterator<Item = Snowflake>,
    ) -> Vec<PresencePayload> {
        user_ids
            .into_iter()
            .filter_map(|user_id| {
                let presence = self.global.get(&user_id)?;
                Some(PresencePayload {
                    user: PresenceUser { id: user_id },
                    guild_id: None,
                    roles: Vec::new(),
                    game: presence.game.clone(),
                    status: presence.status,
                })
            })
            .collect()
    }

    /// Presence payload for one member of a guild
    pub fn payload(
        guild_id: Option<Snowflake>,
        member: &GuildMember,
        presence: &Presence,
    ) -> PresencePayload {
        PresencePayload {
            user: PresenceUser {
                id: member.user_id(),
            },
            guild_id,
            roles: member.role_ids.clone(),
            game: presence.game.clone(),
            status: presence.status,
        }
    }

    /// Apply a user's new presence across all of their guilds
    ///
    /// PRESENCE_UPDATE goes out only for guilds whose stored presence
    /// actually changed. Returns the number of such guilds.
    pub async fn global_update(
        &self,
        user_id: Snowflake,
        guilds: &[Guild],
        presence: Presence,
    ) -> usize {
        self.store_global(user_id, &presence);

        let changed: Vec<(Snowflake, PresencePayload)> = guilds
            .iter()
            .filter_map(|guild| {
                let member = guild.member(user_id)?;
                let key = (guild.id, user_id);
                let previous = self.guilds.get(&key).map(|p| p.value().clone());
                if previous.unwrap_or_default() == presence {
                    return None;
                }
                if presence.status == Status::Offline {
                    self.guilds.remove(&key);
                } else {
                    self.guilds.insert(key, presence.clone());
                }
                Some((guild.id, Self::payload(Some(guild.id), member, &presence)))
            })
            .collect();

        for (guild_id, payload) in &changed {
            self.dispatcher
                .dispatch(
                    DispatchScope::Guild(*guild_id),
                    GatewayEventType::PresenceUpdate,
                    event_data(payload),
                )
                .await;
        }

        tracing::debug!(
            user_id = %user_id,
            status = %presence.status,
            guilds = changed.len(),
            "Presence updated"
        );

        changed.len()
    }

    fn store_global(&self, user_id: Snowflake, presence: &Presence) {
        if presence.status.is_offline() {
            self.global.remove(&user_id);
        } else {
            self.global.insert(user_id, presence.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::WatcherSet;
    use crate::session::SessionRegistry;
    use concord_core::User;

    fn manager() -> PresenceManager {
        let registry = Arc::new(SessionRegistry::new(4));
        let dispatcher = Arc::new(Dispatcher::new(registry, Arc::new(WatcherSet::new())));
        PresenceManager::new(dispatcher)
    }

    fn guild_with(id: i64, users: &[i64]) -> Guild {
        let mut guild = Guild::new(Snowflake::new(id), "guild", Snowflake::new(users[0]));
        for &user in users {
            guild.members.push(GuildMember::new(User::new(
                Snowflake::new(user),
                format!("user{user}"),
                "0001",
            )));
        }
        guild
    }

    #[tokio::test]
    async fn test_update_only_counts_changes() {
        let presences = manager();
        let guilds = vec![guild_with(10, &[1, 2]), guild_with(20, &[1])];
        let user = Snowflake::new(1);

        assert_eq!(presences.global_update(user, &guilds, Presence::online()).await, 2);
        assert_eq!(presences.global_update(user, &guilds, Presence::online()).await, 0);
        assert!(presences.is_online_in(Snowflake::new(10), user));
        assert_eq!(presences.global(user).status, Status::Online);
    }

    #[tokio::test]
    async fn test_offline_removes_entries() {
        let presences = manager();
        let guilds = vec![guild_with(10, &[1, 2])];
        let user = Snowflake::new(1);

        presences.global_update(user, &guilds, Presence::online()).await;
        assert_eq!(presences.guild_presences(&guilds[0]).len(), 1);

        assert_eq!(presences.global_update(user, &guilds, Presence::offline()).await, 1);
        assert!(presences.guild_presences(&guilds[0]).is_empty());
        assert!(presences.global_presences([user]).is_empty());
    }

    #[tokio::test]
    async fn test_non_member_guilds_ignored() {
        let presences = manager();
        let guilds = vec![guild_with(10, &[2])];
        assert_eq!(
            presences
                .global_update(Snowflake::new(1), &guilds, Presence::online())
                .await,
            0
        );
        // the global presence is still recorded
        assert_eq!(presences.global_presences([Snowflake::new(1)]).len(), 1);
    }
}
