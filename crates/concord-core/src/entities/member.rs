//! Member entity - a user's membership in a guild

use chrono::{DateTime, Utc};

use super::User;
use crate::value_objects::Snowflake;

/// Guild member snapshot, carrying the full user it refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    pub user: User,
    pub nickname: Option<String>,
    pub role_ids: Vec<Snowflake>,
    pub joined_at: DateTime<Utc>,
    pub deaf: bool,
    pub mute: bool,
}

impl GuildMember {
    /// Create a new GuildMember joined now
    pub fn new(user: User) -> Self {
        Self {
            user,
            nickname: None,
            role_ids: Vec::new(),
            joined_at: Utc::now(),
            deaf: false,
            mute: false,
        }
    }

    /// Id of the underlying user
    #[inline]
    pub fn user_id(&self) -> Snowflake {
        self.user.id
    }

    /// Get display name (nickname if set, otherwise username)
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.user.username)
    }

    /// Check if member has a specific role
    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.role_ids.contains(&role_id)
    }
}
