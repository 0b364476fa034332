//! Collaborator ports

mod repositories;

pub use repositories::{
    GuildRepository, RelationshipRepository, RepoResult, SettingsRepository, UserRepository,
};
