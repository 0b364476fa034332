//! Fixture file format
//!
//! A fixture is a JSON document describing users (with their tokens),
//! guilds, per-user settings and relationships. Members and relationships
//! refer to users by id and are resolved when the fixture is applied.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use concord_core::entities::{Channel, ChannelType, Role, User};
use concord_core::value_objects::Snowflake;

/// Errors raised while reading or applying a fixture
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Guild {guild} lists unknown member {user}")]
    UnknownMember { guild: Snowflake, user: Snowflake },

    #[error("Relationship of {user} points at unknown user {other}")]
    UnknownRelationshipTarget { user: Snowflake, other: Snowflake },

    #[error("Unknown relationship type {0}")]
    UnknownRelationshipType(u8),
}

/// Root of a fixture document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub users: Vec<FixtureUser>,
    pub guilds: Vec<FixtureGuild>,
    pub settings: Vec<FixtureSettings>,
    pub relationships: Vec<FixtureRelationship>,
}

impl Fixture {
    /// Parse a fixture from JSON text
    pub fn from_json(text: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureUser {
    pub id: Snowflake,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub bot: bool,
    /// Tokens that authenticate as this user
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureGuild {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub owner_id: Snowflake,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub roles: Vec<FixtureRole>,
    #[serde(default)]
    pub channels: Vec<FixtureChannel>,
    #[serde(default)]
    pub members: Vec<FixtureMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRole {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: u64,
    #[serde(default)]
    pub mentionable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureChannel {
    pub id: Snowflake,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureMember {
    pub user_id: Snowflake,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}

/// Client-owned blobs for one user
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSettings {
    pub user_id: Snowflake,
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub guild_settings: Vec<Value>,
    #[serde(default)]
    pub read_state: Vec<Value>,
}

/// A one-directional relationship from `user_id` to `other_id`
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRelationship {
    pub user_id: Snowflake,
    pub other_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
}

fn default_discriminator() -> String {
    "0001".to_string()
}

impl From<&FixtureUser> for User {
    fn from(model: &FixtureUser) -> Self {
        User {
            id: model.id,
            username: model.username.clone(),
            discriminator: model.discriminator.clone(),
            avatar: model.avatar.clone(),
            email: model.email.clone(),
            verified: model.verified,
            bot: model.bot,
        }
    }
}

impl From<FixtureRole> for Role {
    fn from(model: FixtureRole) -> Self {
        Role {
            id: model.id,
            name: model.name,
            color: model.color,
            hoist: model.hoist,
            position: model.position,
            permissions: model.permissions,
            mentionable: model.mentionable,
        }
    }
}

impl FixtureChannel {
    pub(crate) fn into_channel(self, guild_id: Snowflake) -> Channel {
        Channel {
            id: self.id,
            guild_id: Some(guild_id),
            name: self.name,
            channel_type: ChannelType::from(self.kind),
            topic: self.topic,
            position: self.position,
        }
    }
}
