//! Agenda tables and event attachments

use std::collections::BTreeMap;

use calsync_domain::constants::NO_UPCOMING_EVENTS_MESSAGE;
use calsync_domain::utils::markdown::{ensure_subject, markdown_to_html_entities};
use calsync_domain::{Attachment, AttachmentField, Event, Result, TimeZoneName};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

use super::{unescape_link, KITCHEN};

const NO_EVENTS_FOR_DAY_MESSAGE: &str = "You have no events for that day";
const TABLE_HEADER: &str = "| Time | Subject |\n| :-- | :-- |";

/// Extra decoration applied to a rendered event attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOption {
    /// Suffix the time range with the zone name, for channel posts read by
    /// people in other zones.
    ShowTimezone(TimeZoneName),
}

impl RenderOption {
    fn apply(&self, event: &Event, attachment: &mut Attachment) {
        match self {
            Self::ShowTimezone(zone) => {
                let zone = if zone.is_empty() { TimeZoneName::utc() } else { zone.clone() };
                attachment.text = format!("{} ({zone})", time_range(event, &zone));
            }
        }
    }
}

fn local(at: Option<&calsync_domain::EventDateTime>, zone: &TimeZoneName) -> Option<DateTime<Tz>> {
    at.and_then(|dt| dt.in_zone(zone))
}

fn kitchen(at: Option<DateTime<Tz>>) -> String {
    at.map_or_else(|| "n/a".to_string(), |t| t.format(KITCHEN).to_string())
}

fn time_range(event: &Event, zone: &TimeZoneName) -> String {
    format!(
        "{} - {}",
        kitchen(local(event.start.as_ref(), zone)),
        kitchen(local(event.end.as_ref(), zone))
    )
}

fn render_row(event: &Event, zone: &TimeZoneName) -> Result<String> {
    let link = unescape_link(&event.web_link)?;
    let subject = markdown_to_html_entities(ensure_subject(&event.subject));

    if event.is_all_day {
        return Ok(format!("| All day event | [{subject}]({link}) |"));
    }
    Ok(format!("| {} | [{subject}]({link}) |", time_range(event, zone)))
}

/// Agenda grouped by local date, one markdown table per day.
pub fn render_calendar_view(events: &[Event], zone: &TimeZoneName) -> Result<String> {
    if events.is_empty() {
        return Ok(NO_UPCOMING_EVENTS_MESSAGE.to_string());
    }

    let shown_zone = if zone.is_empty() {
        events[0].start.as_ref().map(|s| s.time_zone.clone()).unwrap_or_else(TimeZoneName::utc)
    } else {
        zone.clone()
    };

    let mut by_day: BTreeMap<NaiveDate, Vec<(DateTime<Tz>, &Event)>> = BTreeMap::new();
    for event in events {
        let Some(start) = local(event.start.as_ref(), &shown_zone) else {
            continue;
        };
        by_day.entry(start.date_naive()).or_default().push((start, event));
    }

    let mut out = format!("Times are shown in {shown_zone}");
    for group in by_day.values_mut() {
        group.sort_by_key(|(start, _)| *start);
        let (first, _) = group[0];
        out.push('\n');
        out.push_str(&first.format("%A %B %d, %Y").to_string());
        out.push_str("\n\n");
        out.push_str(TABLE_HEADER);
        for (_, event) in group.iter() {
            out.push('\n');
            out.push_str(&render_row(event, &shown_zone)?);
        }
    }
    Ok(out)
}

/// Agenda for one day as a short message plus one attachment per event.
pub fn render_day_summary(events: &[Event], zone: &TimeZoneName) -> (String, Vec<Attachment>) {
    let Some(first) = events.first() else {
        return (NO_EVENTS_FOR_DAY_MESSAGE.to_string(), Vec::new());
    };

    let day = local(first.start.as_ref(), zone)
        .map(|start| start.format("%A, %d %B").to_string())
        .unwrap_or_default();
    let message = format!("Agenda for {day}.\nTimes are shown in {zone}");

    let attachments = events
        .iter()
        .map(|event| Attachment {
            title: event.subject.clone(),
            text: format!("({})", time_range(event, zone)),
            fields: location_field(event).into_iter().collect(),
            ..Attachment::default()
        })
        .collect();
    (message, attachments)
}

fn location_field(event: &Event) -> Option<AttachmentField> {
    event
        .location
        .as_ref()
        .filter(|location| !location.display_name.is_empty())
        .map(|location| AttachmentField::new("Location", location.display_name.clone(), true))
}

/// Compact attachment for reminders and channel posts.
pub fn render_event_as_attachment(
    event: &Event,
    zone: &TimeZoneName,
    options: &[RenderOption],
) -> Attachment {
    let mut fields: Vec<AttachmentField> = location_field(event).into_iter().collect();
    let mut title_link = String::new();

    if let Some(meeting) = event.online_meeting.as_ref().filter(|m| !m.join_url.is_empty()) {
        title_link = meeting.join_url.clone();
        fields.push(AttachmentField::new("Meeting URL", meeting.join_url.clone(), true));
    }

    let range = time_range(event, zone);
    let mut attachment = Attachment {
        title: markdown_to_html_entities(&event.subject),
        title_link,
        text: range.clone(),
        fallback: format!("{}\n{range}", event.subject),
        fields,
        ..Attachment::default()
    };

    for option in options {
        option.apply(event, &mut attachment);
    }
    attachment
}

pub fn render_upcoming_event_as_attachment(
    event: &Event,
    zone: &TimeZoneName,
    options: &[RenderOption],
) -> (String, Attachment) {
    ("Upcoming event:\n".to_string(), render_event_as_attachment(event, zone, options))
}
