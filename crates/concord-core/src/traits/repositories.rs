//! Repository traits (ports) - the collaborators the gateway reads from
//!
//! The gateway never writes through these. Users, guilds, settings and
//! relationships are owned elsewhere and handed over as snapshots.

use async_trait::async_trait;
use serde_json::Value;

use crate::entities::{Channel, Guild, Relationship, User};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// User Repository
// ============================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Resolve an authentication token to its user
    async fn find_by_token(&self, token: &str) -> RepoResult<Option<User>>;

    /// Find user by ID
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<User>>;
}

// ============================================================================
// Guild Repository
// ============================================================================

#[async_trait]
pub trait GuildRepository: Send + Sync {
    /// Find guild by ID, members and channels included
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Guild>>;

    /// Guilds the user is a member of, ordered by id
    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Guild>>;

    /// Number of guilds the user is a member of
    async fn count_by_user(&self, user_id: Snowflake) -> RepoResult<usize>;

    /// Find a channel by ID
    async fn find_channel(&self, id: Snowflake) -> RepoResult<Option<Channel>>;
}

// ============================================================================
// Settings Repository
// ============================================================================

/// Client-owned blobs. The gateway forwards them untouched.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// User settings object, `{}` when none are stored
    async fn settings_for_user(&self, user_id: Snowflake) -> RepoResult<Value>;

    /// Per-guild notification settings
    async fn guild_settings_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Value>>;

    /// Read markers per channel
    async fn read_state_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Value>>;
}

// ============================================================================
// Relationship Repository
// ============================================================================

#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Friends, blocks and pending requests of the user
    async fn relationships_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Relationship>>;
}
