//! Calendar events as returned by the remote calendar

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::utils::timezone::TimeZoneName;

/// Naive remote timestamp layout; the zone travels separately.
const REMOTE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A wall-clock time with its zone name, as exchanged with the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    #[serde(default)]
    pub time_zone: TimeZoneName,
}

impl EventDateTime {
    pub fn new(date_time: impl Into<String>, time_zone: impl Into<TimeZoneName>) -> Self {
        Self { date_time: date_time.into(), time_zone: time_zone.into() }
    }

    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self {
            date_time: at.naive_utc().format(REMOTE_DATETIME_FORMAT).to_string(),
            time_zone: TimeZoneName::utc(),
        }
    }

    /// Absolute instant, or `None` when the zone or timestamp is unreadable.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let tz = self.time_zone.to_tz()?;
        let naive = NaiveDateTime::parse_from_str(&self.date_time, REMOTE_DATETIME_FORMAT).ok()?;
        tz.from_local_datetime(&naive).earliest().map(|at| at.with_timezone(&Utc))
    }

    /// The same instant expressed in another zone.
    pub fn in_zone(&self, zone: &TimeZoneName) -> Option<DateTime<Tz>> {
        Some(self.to_utc()?.with_timezone(&zone.tz_or_utc()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponseStatus {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(default, rename = "type")]
    pub attendee_type: String,
    #[serde(default)]
    pub status: Option<EventResponseStatus>,
    #[serde(default)]
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeeting {
    #[serde(default)]
    pub join_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "iCalUId")]
    pub ical_uid: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body_preview: String,
    #[serde(default)]
    pub importance: String,
    #[serde(default)]
    pub show_as: String,
    #[serde(default, alias = "weblink")]
    pub web_link: String,
    #[serde(default)]
    pub start: Option<EventDateTime>,
    #[serde(default)]
    pub end: Option<EventDateTime>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub organizer: Option<Attendee>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub response_status: Option<EventResponseStatus>,
    #[serde(default)]
    pub online_meeting: Option<OnlineMeeting>,
    #[serde(default)]
    pub reminder_minutes_before_start: i64,
    #[serde(default)]
    pub is_organizer: bool,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub response_requested: bool,
}

impl Event {
    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        self.start.as_ref().and_then(EventDateTime::to_utc)
    }

    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        self.end.as_ref().and_then(EventDateTime::to_utc)
    }

    pub fn is_busy(&self) -> bool {
        self.show_as == "busy" && !self.is_cancelled
    }

    pub fn is_declined(&self) -> bool {
        self.response_status.as_ref().is_some_and(|status| status.response == "declined")
    }

    /// `"{iCalUID} {start in UTC, RFC 3339}"`, identifying one occurrence.
    pub fn fingerprint(&self) -> Option<String> {
        let start = self.start_utc()?;
        Some(format!("{} {}", self.ical_uid, start.to_rfc3339_opts(SecondsFormat::Secs, true)))
    }
}

/// Sort events by start; events with an unreadable start go first.
pub fn sort_by_start(events: &mut [Event]) {
    events.sort_by_key(Event::start_utc);
}

/// Channels linked to an event, keyed by iCalUID in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub linked_channel_ids: BTreeSet<String>,
}

/// Stored snapshot of an event used for change detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub remote: Event,
    #[serde(default)]
    pub plugin_version: String,
}
