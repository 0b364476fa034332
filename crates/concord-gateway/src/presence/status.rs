//! Presence values

use serde::Serialize;

use crate::protocol::{GamePayload, StatusUpdatePayload};

/// User status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    #[default]
    Offline,
}

impl Status {
    /// Parse a client supplied status; `invisible` is reported as offline
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "online" => Some(Self::Online),
            "idle" => Some(Self::Idle),
            "dnd" => Some(Self::Dnd),
            "offline" | "invisible" => Some(Self::Offline),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub const fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity shown next to a user ("Playing ...")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub url: Option<String>,
}

impl Activity {
    /// Build from a status update's `game`; a game without a name clears it
    #[must_use]
    pub fn from_payload(game: &GamePayload) -> Option<Self> {
        let name = game.name.as_deref().filter(|name| !name.is_empty())?;
        Some(Self {
            kind: game.kind.unwrap_or(0),
            name: name.to_string(),
            url: game.url.clone(),
        })
    }
}

/// A user's status with an optional activity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Presence {
    pub status: Status,
    pub game: Option<Activity>,
}

impl Presence {
    #[must_use]
    pub fn online() -> Self {
        Self {
            status: Status::Online,
            game: None,
        }
    }

    #[must_use]
    pub fn offline() -> Self {
        Self::default()
    }

    /// Effective presence for a STATUS_UPDATE
    ///
    /// Returns `None` when the payload lacks `status`/`afk` or names an
    /// unknown status. Being away forces `idle` unless the user went
    /// offline or invisible.
    #[must_use]
    pub fn from_update(update: &StatusUpdatePayload) -> Option<Self> {
        let requested = Status::parse(update.status.as_deref()?)?;
        update.afk?;

        let status = if update.is_away() && !requested.is_offline() {
            Status::Idle
        } else {
            requested
        };

        Some(Self {
            status,
            game: update.game.as_ref().and_then(Activity::from_payload),
        })
    }
}
