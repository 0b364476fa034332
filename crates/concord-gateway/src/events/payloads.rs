//! Event payload definitions
//!
//! Serializable shapes for the events the gateway emits, built from the
//! read-only domain snapshots.

use concord_core::{Channel, Guild, GuildMember, Relationship, Role, Snowflake, User};
use serde::Serialize;
use serde_json::Value;

use crate::presence::{Activity, Status};

/// Serialize a payload for dispatch
///
/// Payloads here only hold strings, numbers and JSON values, so this does
/// not fail in practice; a failure degrades to `null`.
pub fn event_data<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or_default()
}

// === Connection Events ===

/// READY event payload
#[derive(Debug, Clone, Serialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    pub v: u8,
    pub user: UserPayload,
    pub private_channels: Vec<Value>,
    /// Full guild payloads, or placeholders for bots
    pub guilds: Vec<Value>,
    pub session_id: String,
    /// `[shard_id, shard_count]`
    pub shard: [u32; 2],
    #[serde(rename = "_trace")]
    pub trace: Vec<String>,
    /// Account-private fields, only for non-bot accounts
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub private: Option<UserReadyExtras>,
}

/// READY fields reserved for user (non-bot) accounts
#[derive(Debug, Clone, Serialize)]
pub struct UserReadyExtras {
    pub relationships: Vec<RelationshipPayload>,
    pub user_settings: Value,
    pub user_guild_settings: Vec<Value>,
    pub read_state: Vec<Value>,
    /// Global presences of related users
    pub presences: Vec<PresencePayload>,
    pub connected_accounts: Vec<Value>,
    pub notes: Vec<Value>,
}

/// RESUMED event payload
#[derive(Debug, Clone, Serialize)]
pub struct ResumedEvent {
    #[serde(rename = "_trace")]
    pub trace: Vec<String>,
}

/// Placeholder entry in a bot READY
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    pub unavailable: bool,
}

impl UnavailableGuild {
    #[must_use]
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            unavailable: true,
        }
    }
}

// === User Payload ===

/// User data included in events
#[derive(Debug, Clone, Serialize)]
pub struct UserPayload {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub bot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl UserPayload {
    /// Public view, safe to show to other users
    #[must_use]
    pub fn public(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            discriminator: user.discriminator.clone(),
            avatar: user.avatar.clone(),
            bot: user.bot,
            email: None,
            verified: None,
        }
    }

    /// Private view, for the account owner's own READY
    #[must_use]
    pub fn private(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            verified: Some(user.verified),
            ..Self::public(user)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipPayload {
    /// Id of the related user
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    pub user: UserPayload,
}

impl From<&Relationship> for RelationshipPayload {
    fn from(rel: &Relationship) -> Self {
        Self {
            id: rel.user.id,
            kind: rel.kind.as_u8(),
            user: UserPayload::public(&rel.user),
        }
    }
}

// === Guild Payloads ===

#[derive(Debug, Clone, Serialize)]
pub struct RolePayload {
    pub id: Snowflake,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub position: i32,
    pub permissions: u64,
    pub managed: bool,
    pub mentionable: bool,
}

impl From<&Role> for RolePayload {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            color: role.color,
            hoist: role.hoist,
            position: role.position,
            permissions: role.permissions,
            managed: false,
            mentionable: role.mentionable,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelPayload {
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: u8,
    pub position: i32,
    pub topic: Option<String>,
    pub permission_overwrites: Vec<Value>,
}

impl From<&Channel> for ChannelPayload {
    fn from(channel: &Channel) -> Self {
        Self {
            id: channel.id,
            guild_id: channel.guild_id,
            name: channel.name.clone(),
            channel_type: channel.channel_type.as_u8(),
            position: channel.position,
            topic: channel.topic.clone(),
            permission_overwrites: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberPayload {
    pub user: UserPayload,
    pub nick: Option<String>,
    pub roles: Vec<Snowflake>,
    pub joined_at: String,
    pub deaf: bool,
    pub mute: bool,
}

impl From<&GuildMember> for MemberPayload {
    fn from(member: &GuildMember) -> Self {
        Self {
            user: UserPayload::public(&member.user),
            nick: member.nickname.clone(),
            roles: member.role_ids.clone(),
            joined_at: member.joined_at.to_rfc3339(),
            deaf: member.deaf,
            mute: member.mute,
        }
    }
}

/// Full guild data, as carried by READY and GUILD_CREATE
#[derive(Debug, Clone, Serialize)]
pub struct GuildPayload {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: Snowflake,
    pub region: String,
    pub roles: Vec<RolePayload>,
    pub emojis: Vec<Value>,
    pub features: Vec<String>,
    pub joined_at: String,
    pub large: bool,
    pub unavailable: bool,
    pub member_count: usize,
    pub voice_states: Vec<Value>,
    pub members: Vec<MemberPayload>,
    pub channels: Vec<ChannelPayload>,
    pub presences: Vec<PresencePayload>,
}

impl GuildPayload {
    /// Build from a snapshot with an already projected member list
    #[must_use]
    pub fn new(
        guild: &Guild,
        large: bool,
        members: Vec<MemberPayload>,
        presences: Vec<PresencePayload>,
    ) -> Self {
        Self {
            id: guild.id,
            name: guild.name.clone(),
            icon: guild.icon.clone(),
            owner_id: guild.owner_id,
            region: guild.region.clone(),
            roles: guild.roles.iter().map(RolePayload::from).collect(),
            emojis: Vec::new(),
            features: Vec::new(),
            joined_at: guild.created_at.to_rfc3339(),
            large,
            unavailable: false,
            member_count: guild.member_count(),
            voice_states: Vec::new(),
            members,
            channels: guild.channels.iter().map(ChannelPayload::from).collect(),
            presences,
        }
    }
}

/// GUILD_SYNC event payload
#[derive(Debug, Clone, Serialize)]
pub struct GuildSyncEvent {
    pub id: Snowflake,
    pub presences: Vec<PresencePayload>,
    pub members: Vec<MemberPayload>,
}

/// GUILD_MEMBERS_CHUNK event payload
#[derive(Debug, Clone, Serialize)]
pub struct MembersChunkEvent {
    pub guild_id: Snowflake,
    pub members: Vec<MemberPayload>,
}

// === Presence Payload ===

/// Presences only carry the user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresenceUser {
    pub id: Snowflake,
}

/// PRESENCE_UPDATE payload, also embedded in guild payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresencePayload {
    pub user: PresenceUser,
    pub guild_id: Option<Snowflake>,
    pub roles: Vec<Snowflake>,
    pub game: Option<Activity>,
    pub status: Status,
}
