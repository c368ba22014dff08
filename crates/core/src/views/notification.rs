//! Attachments for webhook-driven event notifications

use calsync_domain::utils::markdown::ensure_subject;
use calsync_domain::{
    Attachment, AttachmentField, Event, PostAction, PostActionIntegration, PostActionOption,
    PostActionType, TimeZoneName,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::fields::{
    diff, event_to_fields, is_important, FIELD_ATTENDEES, FIELD_IMPORTANCE, FIELD_LOCATION,
    FIELD_WHEN,
};

/// Fields shown on a "(new)" notification, in order.
const NEW_EVENT_FIELD_ORDER: [&str; 4] =
    [FIELD_WHEN, FIELD_LOCATION, FIELD_ATTENDEES, FIELD_IMPORTANCE];

pub const EVENT_ID_KEY: &str = "event_id";
pub const SELECTED_OPTION_KEY: &str = "selected_option";

/// Attendee reply offered in the response select menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    NotResponded,
    Yes,
    No,
    Maybe,
}

impl EventResponse {
    pub const ALL: [Self; 4] = [Self::NotResponded, Self::Yes, Self::No, Self::Maybe];

    pub const fn option(&self) -> &'static str {
        match self {
            Self::NotResponded => "Not responded",
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Maybe => "Maybe",
        }
    }

    pub fn from_option(option: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|response| response.option() == option)
    }

    /// Map a remote response status ("accepted", "declined", ...)
    pub fn from_remote(response: &str) -> Option<Self> {
        match response {
            "notResponded" | "none" => Some(Self::NotResponded),
            "accepted" | "organizer" => Some(Self::Yes),
            "declined" => Some(Self::No),
            "tentativelyAccepted" => Some(Self::Maybe),
            _ => None,
        }
    }

    /// Past-tense wording for the confirmation field
    pub const fn pretty(&self) -> &'static str {
        match self {
            Self::NotResponded => "",
            Self::Yes => "accepted",
            Self::No => "declined",
            Self::Maybe => "tentatively accepted",
        }
    }
}

fn base_attachment(event: &Event) -> Attachment {
    let title = ensure_subject(&event.subject).to_string();
    let (author_name, author_link) = match &event.organizer {
        Some(organizer) => (
            organizer.email_address.name.clone(),
            format!("mailto:{}", organizer.email_address.address),
        ),
        None => (String::new(), String::new()),
    };
    Attachment {
        fallback: format!("[{title}]({}): {}", event.web_link, event.body_preview),
        author_name,
        author_link,
        title,
        title_link: event.web_link.clone(),
        text: event.body_preview.clone(),
        ..Attachment::default()
    }
}

fn wants_response(event: &Event) -> bool {
    event.response_requested && !event.is_organizer && !event.is_cancelled
}

/// Select menu that lets an attendee answer an invitation
pub fn event_response_action(event: &Event, url: &str) -> PostAction {
    let mut context = Map::new();
    context.insert(EVENT_ID_KEY.to_string(), Value::String(event.id.clone()));

    let current = event
        .response_status
        .as_ref()
        .and_then(|status| EventResponse::from_remote(&status.response));

    PostAction {
        name: "Response".to_string(),
        action_type: PostActionType::Select,
        options: EventResponse::ALL
            .iter()
            .map(|r| PostActionOption { text: r.option().into(), value: r.option().into() })
            .collect(),
        default_option: current.map(|r| r.option().to_string()).unwrap_or_default(),
        integration: PostActionIntegration { url: url.to_string(), context },
        ..PostAction::default()
    }
}

pub fn new_event_attachment(
    event: &Event,
    zone: &TimeZoneName,
    respond_url: &str,
    now: DateTime<Utc>,
) -> Attachment {
    let mut attachment = base_attachment(event);
    attachment.title = format!("(new) {}", attachment.title);

    let fields = event_to_fields(event, zone, now);
    attachment.fields = NEW_EVENT_FIELD_ORDER
        .iter()
        .filter_map(|name| fields.get(name).map(|value| (name, value)))
        .map(|(name, value)| AttachmentField::new(*name, value.joined(), true))
        .collect();

    if wants_response(event) {
        attachment.actions = vec![event_response_action(event, respond_url)];
    }
    attachment
}

/// Attachment describing the important changes between `prior` and `event`,
/// or `None` when nothing worth notifying changed.
pub fn updated_event_attachment(
    event: &Event,
    prior: &Event,
    zone: &TimeZoneName,
    respond_url: &str,
    now: DateTime<Utc>,
) -> Option<Attachment> {
    let new_fields = event_to_fields(event, zone, now);
    let prior_fields = event_to_fields(prior, zone, now);
    let changes = diff(&prior_fields, &new_fields);
    if !changes.has_important_change() {
        return None;
    }

    let mut attachment = base_attachment(event);
    attachment.title = format!("(updated) {}", attachment.title);

    for name in changes.added.iter().filter(|n| is_important(n)) {
        let value = new_fields[name].joined();
        attachment.fields.push(AttachmentField::new(*name, value, true));
    }
    for name in changes.updated.iter().filter(|n| is_important(n)) {
        let value =
            format!("~~{}~~ \u{2192} {}", prior_fields[name].joined(), new_fields[name].joined());
        attachment.fields.push(AttachmentField::new(*name, value, true));
    }
    for name in changes.deleted.iter().filter(|n| is_important(n)) {
        let value = format!("~~{}~~", prior_fields[name].joined());
        attachment.fields.push(AttachmentField::new(*name, value, true));
    }

    if wants_response(event) {
        attachment.actions = vec![event_response_action(event, respond_url)];
    }
    Some(attachment)
}
