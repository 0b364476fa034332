//! Guild watcher set

use std::collections::HashSet;

use concord_core::Snowflake;
use dashmap::DashMap;

/// Users subscribed to each guild's fan-out
///
/// Membership alone does not make a user a watcher; they are marked when
/// they receive the guild in READY (small guilds) or sync it explicitly.
#[derive(Debug, Default)]
pub struct WatcherSet {
    guilds: DashMap<Snowflake, HashSet<Snowflake>>,
}

impl WatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a user; returns `false` if they already were
    pub fn mark(&self, guild_id: Snowflake, user_id: Snowflake) -> bool {
        self.guilds.entry(guild_id).or_default().insert(user_id)
    }

    /// Unsubscribe a user; returns `false` if they were not subscribed
    pub fn unmark(&self, guild_id: Snowflake, user_id: Snowflake) -> bool {
        let removed = self
            .guilds
            .get_mut(&guild_id)
            .is_some_and(|mut users| users.remove(&user_id));
        self.guilds.remove_if(&guild_id, |_, users| users.is_empty());
        removed
    }

    pub fn is_watching(&self, guild_id: Snowflake, user_id: Snowflake) -> bool {
        self.guilds
            .get(&guild_id)
            .is_some_and(|users| users.contains(&user_id))
    }

    /// Snapshot of a guild's watchers
    pub fn watchers(&self, guild_id: Snowflake) -> Vec<Snowflake> {
        self.guilds
            .get(&guild_id)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn watcher_count(&self, guild_id: Snowflake) -> usize {
        self.guilds.get(&guild_id).map_or(0, |users| users.len())
    }
}
