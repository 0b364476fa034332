//! In-memory implementation of every collaborator port

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, instrument};

use concord_core::entities::{
    Channel, Guild, GuildMember, Relationship, RelationshipType, User,
};
use concord_core::traits::{
    GuildRepository, RelationshipRepository, RepoResult, SettingsRepository, UserRepository,
};
use concord_core::value_objects::Snowflake;

use crate::fixture::{Fixture, FixtureError};

/// Collaborator store held entirely in memory
///
/// Reads clone snapshots out of the maps, so callers never hold a shard
/// lock across an await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<Snowflake, User>,
    tokens: DashMap<String, Snowflake>,
    guilds: DashMap<Snowflake, Guild>,
    /// channel id -> owning guild id
    channels: DashMap<Snowflake, Snowflake>,
    settings: DashMap<Snowflake, Value>,
    guild_settings: DashMap<Snowflake, Vec<Value>>,
    read_states: DashMap<Snowflake, Vec<Value>>,
    relationships: DashMap<Snowflake, Vec<Relationship>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON fixture from disk and build a store from it
    pub async fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FixtureError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let store = Self::new();
        store.load_fixture(Fixture::from_json(&text)?)?;
        Ok(store)
    }

    /// Apply a fixture on top of the current contents
    pub fn load_fixture(&self, fixture: Fixture) -> Result<(), FixtureError> {
        for model in &fixture.users {
            let user = User::from(model);
            for token in &model.tokens {
                self.tokens.insert(token.clone(), user.id);
            }
            self.users.insert(user.id, user);
        }

        for model in fixture.guilds {
            let mut guild = Guild::new(model.id, model.name, model.owner_id);
            guild.icon = model.icon;
            if let Some(region) = model.region {
                guild.region = region;
            }
            guild.roles = model.roles.into_iter().map(Into::into).collect();
            guild.channels = model
                .channels
                .into_iter()
                .map(|c| c.into_channel(model.id))
                .collect();
            for member in model.members {
                let user = self.user(member.user_id).ok_or(FixtureError::UnknownMember {
                    guild: model.id,
                    user: member.user_id,
                })?;
                let mut entry = GuildMember::new(user);
                entry.nickname = member.nick;
                entry.role_ids = member.roles;
                entry.deaf = member.deaf;
                entry.mute = member.mute;
                if let Some(joined_at) = member.joined_at {
                    entry.joined_at = joined_at;
                }
                guild.members.push(entry);
            }
            self.insert_guild(guild);
        }

        for blob in fixture.settings {
            if let Some(settings) = blob.settings {
                self.set_settings(blob.user_id, settings);
            }
            self.set_guild_settings(blob.user_id, blob.guild_settings);
            self.set_read_state(blob.user_id, blob.read_state);
        }

        for rel in fixture.relationships {
            let other = self
                .user(rel.other_id)
                .ok_or(FixtureError::UnknownRelationshipTarget {
                    user: rel.user_id,
                    other: rel.other_id,
                })?;
            let kind = RelationshipType::from_u8(rel.kind)
                .ok_or(FixtureError::UnknownRelationshipType(rel.kind))?;
            self.add_relationship(rel.user_id, Relationship { user: other, kind });
        }

        info!(
            users = self.users.len(),
            guilds = self.guilds.len(),
            "Fixture loaded"
        );
        Ok(())
    }

    /// Insert or replace a user and register a token for it
    pub fn insert_user(&self, user: User, token: impl Into<String>) {
        self.tokens.insert(token.into(), user.id);
        self.users.insert(user.id, user);
    }

    /// Insert or replace a guild snapshot
    pub fn insert_guild(&self, guild: Guild) {
        for channel in &guild.channels {
            self.channels.insert(channel.id, guild.id);
        }
        self.guilds.insert(guild.id, guild);
    }

    pub fn set_settings(&self, user_id: Snowflake, settings: Value) {
        self.settings.insert(user_id, settings);
    }

    pub fn set_guild_settings(&self, user_id: Snowflake, settings: Vec<Value>) {
        self.guild_settings.insert(user_id, settings);
    }

    pub fn set_read_state(&self, user_id: Snowflake, read_state: Vec<Value>) {
        self.read_states.insert(user_id, read_state);
    }

    pub fn add_relationship(&self, user_id: Snowflake, relationship: Relationship) {
        self.relationships
            .entry(user_id)
            .or_default()
            .push(relationship);
    }

    fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|u| u.value().clone())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    #[instrument(skip_all)]
    async fn find_by_token(&self, token: &str) -> RepoResult<Option<User>> {
        let id = match self.tokens.get(token) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        Ok(self.user(id))
    }

    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<User>> {
        Ok(self.user(id))
    }
}

#[async_trait]
impl GuildRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Guild>> {
        Ok(self.guilds.get(&id).map(|g| g.value().clone()))
    }

    #[instrument(skip(self))]
    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Guild>> {
        let mut guilds: Vec<Guild> = self
            .guilds
            .iter()
            .filter(|g| g.has_member(user_id))
            .map(|g| g.value().clone())
            .collect();
        guilds.sort_by_key(|g| g.id);
        Ok(guilds)
    }

    async fn count_by_user(&self, user_id: Snowflake) -> RepoResult<usize> {
        Ok(self.guilds.iter().filter(|g| g.has_member(user_id)).count())
    }

    async fn find_channel(&self, id: Snowflake) -> RepoResult<Option<Channel>> {
        let guild_id = match self.channels.get(&id) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        Ok(self
            .guilds
            .get(&guild_id)
            .and_then(|g| g.channel(id).cloned()))
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn settings_for_user(&self, user_id: Snowflake) -> RepoResult<Value> {
        Ok(self
            .settings
            .get(&user_id)
            .map_or_else(|| json!({}), |s| s.value().clone()))
    }

    async fn guild_settings_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Value>> {
        Ok(self
            .guild_settings
            .get(&user_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn read_state_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Value>> {
        Ok(self
            .read_states
            .get(&user_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RelationshipRepository for MemoryStore {
    async fn relationships_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Relationship>> {
        Ok(self
            .relationships
            .get(&user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}
