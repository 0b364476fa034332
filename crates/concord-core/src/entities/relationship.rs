//! Relationship entity - friendships and blocks between users

use super::User;

/// Relationship kind, numbered as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RelationshipType {
    Friend = 1,
    Blocked = 2,
    IncomingRequest = 3,
    OutgoingRequest = 4,
}

impl RelationshipType {
    /// Get the numeric wire value
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse from the numeric wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Friend),
            2 => Some(Self::Blocked),
            3 => Some(Self::IncomingRequest),
            4 => Some(Self::OutgoingRequest),
            _ => None,
        }
    }
}

/// A relationship from the viewing user to `user`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub user: User,
    pub kind: RelationshipType,
}

impl Relationship {
    /// Check if this is an accepted friendship
    #[inline]
    pub fn is_friend(&self) -> bool {
        self.kind == RelationshipType::Friend
    }
}
