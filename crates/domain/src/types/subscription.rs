//! Remote push subscriptions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription as known to the remote calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSubscription {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub change_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notification_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expiration_date_time: String,
    /// Remote id of the user the subscription was created for.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub creator_id: String,
}

impl RemoteSubscription {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expiration_date_time)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }
}

/// Locally stored subscription record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub remote: RemoteSubscription,
    pub platform_creator_id: String,
    #[serde(default)]
    pub plugin_version: String,
}
