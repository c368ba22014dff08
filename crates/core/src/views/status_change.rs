//! Confirmation prompt shown before the engine changes a user's presence

use calsync_domain::{Attachment, Event, PostAction, PostActionIntegration, PresenceStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::unescape_link;

pub const STATUS_CHANGE_TITLE: &str = "Status change";

/// Context keys carried by the Yes/No buttons
pub mod context_keys {
    pub const VALUE: &str = "value";
    pub const CHANGE_TO: &str = "change_to";
    pub const PRETTY_CHANGE_TO: &str = "pretty_change_to";
    pub const HAS_EVENT: &str = "hasEvent";
    pub const SUBJECT: &str = "subject";
    pub const WEBLINK: &str = "weblink";
    pub const START_TIME: &str = "startTime";
}

/// "Your event ... will start soon." or "... is ongoing." once started.
pub fn render_event_will_start_line(
    subject: &str,
    weblink: &str,
    start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let link = unescape_link(weblink).unwrap_or_else(|_| weblink.to_string());
    let started = start.is_some_and(|start| start < now);
    match (subject.is_empty(), started) {
        (false, false) => format!("Your event [{subject}]({link}) will start soon."),
        (true, false) => format!("[An event with no subject]({link}) will start soon."),
        (false, true) => format!("Your event [{subject}]({link}) is ongoing."),
        (true, true) => format!("[An event with no subject]({link}) is ongoing."),
    }
}

fn schedule_item(event: Option<&Event>, status: PresenceStatus, now: DateTime<Utc>) -> String {
    match event {
        None => format!(
            "You have no upcoming events.\n Shall I change your status back to {}?",
            status.pretty_name()
        ),
        Some(event) => format!(
            "{}\nShall I change your status to {}?",
            render_event_will_start_line(&event.subject, &event.web_link, event.start_utc(), now),
            status.pretty_name()
        ),
    }
}

fn action(name: &str, url: &str, context: Map<String, Value>) -> PostAction {
    PostAction {
        name: name.to_string(),
        integration: PostActionIntegration { url: url.to_string(), context },
        ..PostAction::default()
    }
}

fn attach_event(context: &mut Map<String, Value>, event: Option<&Event>) {
    use context_keys::*;

    context.insert(HAS_EVENT.into(), Value::Bool(event.is_some()));
    if let Some(event) = event {
        let start = event
            .start_utc()
            .map(|s| s.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        context.insert(SUBJECT.into(), Value::String(event.subject.clone()));
        context.insert(WEBLINK.into(), Value::String(event.web_link.clone()));
        context.insert(START_TIME.into(), Value::String(start));
    }
}

/// Prompt asking whether to switch to `status`. The event mentioned is the
/// first one that has not started yet, else the last ongoing one.
pub fn render_status_change_attachment(
    events: &[Event],
    status: PresenceStatus,
    url: &str,
    now: DateTime<Utc>,
) -> Attachment {
    use context_keys::*;

    let event = events
        .iter()
        .find(|e| e.start_utc().is_some_and(|start| start > now))
        .or_else(|| events.last());

    let mut yes = Map::new();
    yes.insert(VALUE.into(), Value::Bool(true));
    yes.insert(CHANGE_TO.into(), Value::String(status.as_str().to_string()));
    yes.insert(PRETTY_CHANGE_TO.into(), Value::String(status.pretty_name().to_string()));
    attach_event(&mut yes, event);

    let mut no = Map::new();
    no.insert(VALUE.into(), Value::Bool(false));
    attach_event(&mut no, event);

    let text = schedule_item(event, status, now);
    Attachment {
        fallback: format!("{STATUS_CHANGE_TITLE}: {text}"),
        title: STATUS_CHANGE_TITLE.to_string(),
        text,
        actions: vec![action("Yes", url, yes), action("No", url, no)],
        ..Attachment::default()
    }
}
