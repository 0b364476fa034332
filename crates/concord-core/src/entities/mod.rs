//! Domain entities - snapshots read by the gateway

mod channel;
mod guild;
mod member;
mod relationship;
mod role;
mod user;

pub use channel::{Channel, ChannelType};
pub use guild::Guild;
pub use member::GuildMember;
pub use relationship::{Relationship, RelationshipType};
pub use role::Role;
pub use user::User;
