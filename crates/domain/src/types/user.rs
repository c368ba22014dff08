//! Connected users and the user index

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::settings::Settings;
use crate::types::status::PresenceStatus;

/// Identity of the user on the remote calendar service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub user_principal_name: String,
    #[serde(default)]
    pub mail: String,
}

/// OAuth2 token as persisted with the user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl OAuth2Token {
    /// True when the token is still valid for longer than `leeway`.
    /// Tokens without an expiry never need a refresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, leeway: chrono::Duration) -> bool {
        match self.expiry {
            Some(expiry) => expiry - now > leeway,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeFlowStatus {
    #[serde(default)]
    pub post_ids: HashMap<String, String>,
    #[serde(default)]
    pub step: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub remote: RemoteUser,
    /// `None` once the user has been marked inactive.
    #[serde(default)]
    pub oauth2_token: Option<OAuth2Token>,
    #[serde(default)]
    pub plugin_version: String,
    pub platform_user_id: String,
    #[serde(default)]
    pub platform_username: String,
    #[serde(default)]
    pub platform_display_name: String,
    /// Presence captured before a busy interval began.
    #[serde(default)]
    pub last_status: Option<PresenceStatus>,
    #[serde(default)]
    pub welcome_flow_status: WelcomeFlowStatus,
    /// Fingerprints of the events currently holding the user busy.
    #[serde(default, rename = "events")]
    pub active_events: Vec<String>,
    /// Remote event id to linked channel id.
    #[serde(default, rename = "linkedEvents")]
    pub channel_events: HashMap<String, String>,
    #[serde(default)]
    pub is_custom_status_set: bool,
}

impl User {
    pub fn is_connected(&self) -> bool {
        self.oauth2_token.is_some()
    }

    pub fn short(&self) -> UserShort {
        UserShort {
            platform_username: self.platform_username.clone(),
            platform_display_name: self.platform_display_name.clone(),
            platform_user_id: self.platform_user_id.clone(),
            remote_id: self.remote.id.clone(),
            email: self.remote.mail.clone(),
        }
    }
}

/// Chat platform account as reported by the platform API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    /// Non-zero when the account is deactivated.
    #[serde(default)]
    pub delete_at: i64,
}

impl PlatformUser {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn is_active(&self) -> bool {
        self.delete_at == 0
    }
}

/// Compact entry of the user index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserShort {
    pub platform_username: String,
    pub platform_display_name: String,
    pub platform_user_id: String,
    pub remote_id: String,
    pub email: String,
}

impl UserShort {
    pub fn matches(&self, term: &str) -> bool {
        self.platform_username.contains(term)
            || self.platform_display_name.contains(term)
            || self.email.contains(term)
    }
}

/// Ordered list of connected users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIndex(pub Vec<UserShort>);

impl UserIndex {
    pub fn single(entry: UserShort) -> Self {
        Self(vec![entry])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UserShort> {
        self.0.iter()
    }

    pub fn by_platform_id(&self, platform_user_id: &str) -> Option<&UserShort> {
        self.0.iter().find(|u| u.platform_user_id == platform_user_id)
    }

    pub fn by_remote_id(&self, remote_id: &str) -> Option<&UserShort> {
        self.0.iter().find(|u| u.remote_id == remote_id)
    }

    /// Replace the entry with the same platform id, or append.
    pub fn upsert(&mut self, entry: UserShort) {
        match self.0.iter_mut().find(|u| u.platform_user_id == entry.platform_user_id) {
            Some(existing) => *existing = entry,
            None => self.0.push(entry),
        }
    }

    pub fn remove(&mut self, platform_user_id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|u| u.platform_user_id != platform_user_id);
        before != self.0.len()
    }

    pub fn search(&self, term: &str, limit: usize) -> Self {
        Self(self.0.iter().filter(|u| u.matches(term)).take(limit).cloned().collect())
    }

    pub fn platform_user_ids(&self) -> Vec<String> {
        self.0.iter().map(|u| u.platform_user_id.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a UserIndex {
    type Item = &'a UserShort;
    type IntoIter = std::slice::Iter<'a, UserShort>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
