//! Calendar view requests and responses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::event::Event;
use crate::utils::timezone::TimeZoneName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarViewRequest {
    pub remote_user_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Error embedded in a single response of a batched request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteApiError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarViewResponse {
    pub remote_user_id: String,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub error: Option<RemoteApiError>,
}

impl CalendarViewResponse {
    pub fn ok(remote_user_id: impl Into<String>, events: Vec<Event>) -> Self {
        Self { remote_user_id: remote_user_id.into(), events, error: None }
    }

    pub fn failed(remote_user_id: impl Into<String>, error: RemoteApiError) -> Self {
        Self { remote_user_id: remote_user_id.into(), events: Vec::new(), error: Some(error) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxSettings {
    #[serde(default)]
    pub time_zone: TimeZoneName,
}

/// Counters reported by status sync runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub processed: usize,
    pub status_changed: usize,
    pub status_failed: usize,
}
