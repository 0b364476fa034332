//! Presence tracking
//!
//! Ephemeral per-guild and global presences. Nothing here is persisted;
//! a presence absent from the maps is offline.

mod manager;
mod status;

pub use manager::PresenceManager;
pub use status::{Activity, Presence, Status};
