//! Guild payload projection

use concord_core::Guild;

use crate::events::{GuildPayload, MemberPayload};
use crate::presence::PresenceManager;

/// Members with a non-offline presence in the guild
pub fn online_members(presence: &PresenceManager, guild: &Guild) -> Vec<MemberPayload> {
    guild
        .members
        .iter()
        .filter(|member| presence.is_online_in(guild.id, member.user_id()))
        .map(MemberPayload::from)
        .collect()
}

/// Full guild payload as seen by a session
///
/// Guilds above the session's `large_threshold` carry only their online
/// members.
pub fn guild_payload(presence: &PresenceManager, guild: &Guild, large_threshold: u32) -> GuildPayload {
    let large = guild.is_large(large_threshold);
    let members = if large {
        online_members(presence, guild)
    } else {
        guild.members.iter().map(MemberPayload::from).collect()
    };
    GuildPayload::new(guild, large, members, presence.guild_presences(guild))
}
