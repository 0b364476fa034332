//! Role entity - a guild role as carried in guild payloads

use crate::value_objects::Snowflake;

/// Role snapshot. Permissions are an opaque bitfield to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub position: i32,
    pub permissions: u64,
    pub mentionable: bool,
}

impl Role {
    /// Create a new Role
    pub fn new(id: Snowflake, name: impl Into<String>, permissions: u64) -> Self {
        Self {
            id,
            name: name.into(),
            color: 0,
            hoist: false,
            position: 0,
            permissions,
            mentionable: false,
        }
    }

    /// The @everyone role shares its id with the guild
    pub fn everyone(guild_id: Snowflake, permissions: u64) -> Self {
        Self::new(guild_id, "@everyone", permissions)
    }

    /// Whether this is the guild's @everyone role
    #[inline]
    pub fn is_everyone(&self, guild_id: Snowflake) -> bool {
        self.id == guild_id
    }
}
