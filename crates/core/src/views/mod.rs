//! Pure renderers from calendar data to chat messages and attachments

pub mod calendar;
pub mod fields;
pub mod notification;
pub mod status_change;

pub use calendar::{
    render_calendar_view, render_day_summary, render_event_as_attachment,
    render_upcoming_event_as_attachment, RenderOption,
};
pub use notification::{new_event_attachment, updated_event_attachment, EventResponse};
pub use status_change::{render_event_will_start_line, render_status_change_attachment};

use calsync_domain::{CalsyncError, Result};

pub(crate) const KITCHEN: &str = "%-I:%M%p";

/// Web links arrive query-escaped from the remote.
pub(crate) fn unescape_link(link: &str) -> Result<String> {
    urlencoding::decode(&link.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|e| CalsyncError::Validation(format!("invalid event link: {e}")))
}
