//! Guild entity - a community snapshot with its members and channels

use chrono::{DateTime, Utc};

use super::{Channel, GuildMember, Role};
use crate::value_objects::Snowflake;

/// Guild (server) snapshot
///
/// The gateway only reads guilds; the snapshot carries everything needed
/// to build GUILD_CREATE, GUILD_SYNC and member chunk payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: Snowflake,
    pub region: String,
    pub roles: Vec<Role>,
    pub channels: Vec<Channel>,
    pub members: Vec<GuildMember>,
    pub created_at: DateTime<Utc>,
}

impl Guild {
    /// Create a new empty Guild
    pub fn new(id: Snowflake, name: impl Into<String>, owner_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            icon: None,
            owner_id,
            region: "local".to_string(),
            roles: Vec::new(),
            channels: Vec::new(),
            members: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Number of members in the guild
    #[inline]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// A guild is large when its member count exceeds the threshold
    #[inline]
    pub fn is_large(&self, threshold: u32) -> bool {
        self.member_count() > threshold as usize
    }

    /// Check if a user is the guild owner
    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }

    /// Look up a member by user id
    pub fn member(&self, user_id: Snowflake) -> Option<&GuildMember> {
        self.members.iter().find(|m| m.user_id() == user_id)
    }

    /// Check if a user belongs to this guild
    pub fn has_member(&self, user_id: Snowflake) -> bool {
        self.member(user_id).is_some()
    }

    /// Look up a channel by id
    pub fn channel(&self, channel_id: Snowflake) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }
}
