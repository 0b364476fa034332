//! # concord-core
//!
//! Domain layer for the gateway: read-only snapshots of users and guilds,
//! the `Snowflake` value object, and the collaborator ports the gateway
//! consumes. Nothing in here knows about sockets or storage engines.

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, ChannelType, Guild, GuildMember, Relationship, RelationshipType, Role, User,
};
pub use error::DomainError;
pub use traits::{
    GuildRepository, RelationshipRepository, RepoResult, SettingsRepository, UserRepository,
};
pub use value_objects::{Snowflake, SnowflakeParseError};
