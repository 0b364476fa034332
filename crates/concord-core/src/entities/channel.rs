//! Channel entity - a guild text/voice channel or category

use crate::value_objects::Snowflake;

/// Channel type, numbered as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ChannelType {
    /// Guild text channel
    #[default]
    GuildText = 0,
    /// Direct message between users
    Dm = 1,
    /// Guild voice channel
    GuildVoice = 2,
    /// Guild category for organizing channels
    GuildCategory = 4,
}

impl ChannelType {
    /// Get the numeric wire value
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Dm,
            2 => Self::GuildVoice,
            4 => Self::GuildCategory,
            _ => Self::GuildText, // Default for 0 and unknown values
        }
    }
}

/// Channel snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub name: String,
    pub channel_type: ChannelType,
    pub topic: Option<String>,
    pub position: i32,
}

impl Channel {
    /// Create a new guild text channel
    pub fn new_text(id: Snowflake, guild_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            guild_id: Some(guild_id),
            name: name.into(),
            channel_type: ChannelType::GuildText,
            topic: None,
            position: 0,
        }
    }

    /// Check if this is a guild channel
    #[inline]
    pub fn is_guild_channel(&self) -> bool {
        self.guild_id.is_some()
    }
}
