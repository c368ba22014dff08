//! Field extraction and diffing for webhook change notifications

use std::collections::BTreeMap;

use calsync_domain::utils::markdown::ensure_subject;
use calsync_domain::{Attendee, Event, TimeZoneName};
use chrono::{DateTime, Datelike, Utc};

use super::KITCHEN;

pub const FIELD_SUBJECT: &str = "Subject";
pub const FIELD_BODY_PREVIEW: &str = "BodyPreview";
pub const FIELD_IMPORTANCE: &str = "Importance";
pub const FIELD_DURATION: &str = "Duration";
pub const FIELD_WHEN: &str = "When";
pub const FIELD_LOCATION: &str = "Location";
pub const FIELD_ATTENDEES: &str = "Attendees";
pub const FIELD_ORGANIZER: &str = "Organizer";
pub const FIELD_RESPONSE_STATUS: &str = "ResponseStatus";

/// Changes to these fields are worth a notification.
pub const IMPORTANT_FIELDS: [&str; 2] = [FIELD_SUBJECT, FIELD_WHEN];

const NOT_DEFINED: &str = "Not defined";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    pub fn joined(&self) -> String {
        match self {
            Self::Single(value) => value.clone(),
            Self::Multi(values) => values.join(", "),
        }
    }
}

pub type Fields = BTreeMap<&'static str, FieldValue>;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FieldDiff {
    pub added: Vec<&'static str>,
    pub updated: Vec<&'static str>,
    pub deleted: Vec<&'static str>,
}

impl FieldDiff {
    pub fn is_changed(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty())
    }

    pub fn has_important_change(&self) -> bool {
        self.added
            .iter()
            .chain(&self.updated)
            .chain(&self.deleted)
            .any(|name| is_important(name))
    }
}

pub fn is_important(name: &str) -> bool {
    IMPORTANT_FIELDS.contains(&name)
}

pub fn diff(before: &Fields, after: &Fields) -> FieldDiff {
    let mut result = FieldDiff::default();
    for (name, value) in after {
        match before.get(name) {
            None => result.added.push(*name),
            Some(prior) if prior != value => result.updated.push(*name),
            Some(_) => {}
        }
    }
    result.deleted = before.keys().filter(|name| !after.contains_key(*name)).copied().collect();
    result
}

fn or_not_defined(value: &str) -> String {
    if value.is_empty() {
        NOT_DEFINED.to_string()
    } else {
        value.to_string()
    }
}

fn mailto(attendee: &Attendee) -> String {
    format!("[{}](mailto:{})", attendee.email_address.name, attendee.email_address.address)
}

fn when(event: &Event, zone: &TimeZoneName, now: DateTime<Utc>) -> String {
    let (Some(start), Some(end)) = (
        event.start.as_ref().and_then(|s| s.in_zone(zone)),
        event.end.as_ref().and_then(|e| e.in_zone(zone)),
    ) else {
        return "n/a".to_string();
    };

    let day_format =
        if start.year() == now.year() { "%A, %B %d" } else { "%A, %B %d, %Y" };
    let day = start.format(day_format);
    if event.is_all_day {
        return format!("{day} · (All day event)");
    }
    format!("{day} · ({} - {})", start.format(KITCHEN), end.format(KITCHEN))
}

fn duration(event: &Event) -> String {
    let (Some(start), Some(end)) = (event.start_utc(), event.end_utc()) else {
        return String::new();
    };
    let span = end - start;
    let total_minutes = (span.num_seconds() as f64 / 60.0).round() as i64;
    let total_hours = span.num_hours();
    let days = total_hours / 24;
    let hours = total_hours - days * 24;
    let minutes = total_minutes - total_hours * 60;

    if days > 0 {
        return format!("{days} days");
    }
    if event.is_all_day {
        return "all-day".to_string();
    }

    let mut out = match hours {
        0 => String::new(),
        1 => "one hour".to_string(),
        n => format!("{n} hours"),
    };
    if minutes > 0 {
        if !out.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&format!("{minutes} minutes"));
    }
    out
}

/// Snapshot of the user-visible fields of an event in the viewer's zone.
pub fn event_to_fields(event: &Event, zone: &TimeZoneName, now: DateTime<Utc>) -> Fields {
    let mut attendees: Vec<String> = event.attendees.iter().map(mailto).collect();
    if attendees.is_empty() {
        attendees.push("None".to_string());
    }

    let organizer = event.organizer.as_ref().map(mailto).unwrap_or_else(|| "[](mailto:)".into());
    let location = event.location.as_ref().map(|l| l.display_name.as_str()).unwrap_or_default();
    let response = event.response_status.as_ref().map(|r| r.response.clone()).unwrap_or_default();

    Fields::from([
        (FIELD_SUBJECT, FieldValue::Single(ensure_subject(&event.subject).to_string())),
        (FIELD_BODY_PREVIEW, FieldValue::Single(or_not_defined(&event.body_preview))),
        (FIELD_IMPORTANCE, FieldValue::Single(or_not_defined(&event.importance))),
        (FIELD_WHEN, FieldValue::Single(or_not_defined(&when(event, zone, now)))),
        (FIELD_DURATION, FieldValue::Single(or_not_defined(&duration(event)))),
        (FIELD_ORGANIZER, FieldValue::Single(organizer)),
        (FIELD_LOCATION, FieldValue::Single(or_not_defined(location))),
        (FIELD_RESPONSE_STATUS, FieldValue::Single(response)),
        (FIELD_ATTENDEES, FieldValue::Multi(attendees)),
    ])
}
