//! Gateway events
//!
//! Event names and the payload shapes the gateway itself produces.

mod event_types;
mod payloads;

pub use event_types::GatewayEventType;
pub use payloads::{
    event_data, ChannelPayload, GuildPayload, GuildSyncEvent, MemberPayload, MembersChunkEvent,
    PresencePayload, PresenceUser, ReadyEvent, RelationshipPayload, ResumedEvent, RolePayload,
    UnavailableGuild, UserPayload, UserReadyExtras,
};
