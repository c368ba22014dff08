//! Chat presence

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Presence state on the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Dnd,
    Offline,
}

impl_domain_status_conversions!(PresenceStatus {
    Online => "online",
    Away => "away",
    Dnd => "dnd",
    Offline => "offline",
});

impl PresenceStatus {
    /// Human-readable label used in confirmation posts.
    pub const fn pretty_name(&self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Away => "Away",
            Self::Dnd => "Do Not Disturb",
            Self::Offline => "Offline",
        }
    }
}

/// Current presence of a platform user as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub user_id: String,
    pub status: PresenceStatus,
    /// True when the user picked this status themselves.
    pub manual: bool,
}

impl PlatformStatus {
    pub fn new(user_id: impl Into<String>, status: PresenceStatus, manual: bool) -> Self {
        Self { user_id: user_id.into(), status, manual }
    }
}

/// Custom status shown next to the user's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomStatus {
    pub emoji: String,
    pub text: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration: String,
}
