//! Upcoming-event reminders
//!
//! An event gets a reminder when its start lies within
//! [`UPCOMING_EVENT_NOTIFICATION_WINDOW`] of `now + 10min`. The window is
//! slightly wider than half the sync interval, so each event lands in exactly
//! one tick under a regular schedule.

use calsync_common::LimitedLog;
use calsync_domain::constants::{UPCOMING_EVENT_NOTIFICATION_TIME, UPCOMING_EVENT_NOTIFICATION_WINDOW};
use calsync_domain::{Event, Post, TimeZoneName, User};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::fetch::UserView;
use super::{Engine, FetchPlan};
use crate::views::{render_event_as_attachment, render_upcoming_event_as_attachment, RenderOption};

const CHANNEL_REMINDER_MESSAGE: &str = "Upcoming event";

/// Whether `event` is due for a reminder at `now`
pub fn is_reminder_due(event: &Event, now: DateTime<Utc>) -> bool {
    if event.is_cancelled {
        return false;
    }
    let Some(start) = event.start_utc() else {
        return false;
    };
    let diff = start - (now + UPCOMING_EVENT_NOTIFICATION_TIME);
    diff.abs() < UPCOMING_EVENT_NOTIFICATION_WINDOW
}

impl Engine {
    pub(crate) async fn deliver_reminders(&self, plan: &FetchPlan, views: &[UserView]) {
        let now = self.now();
        let log = LimitedLog::new("reminders");
        for view in views.iter().filter(|v| v.user.settings.receive_reminders) {
            self.notify_upcoming_events(plan, &view.user, &view.events, now, &log).await;
        }
    }

    async fn notify_upcoming_events(
        &self,
        plan: &FetchPlan,
        user: &User,
        events: &[Event],
        now: DateTime<Utc>,
        log: &LimitedLog,
    ) {
        let id = &user.platform_user_id;
        let mut zone: Option<TimeZoneName> = None;

        for event in events.iter().filter(|e| is_reminder_due(e, now)) {
            if zone.is_none() {
                match self.user_time_zone(plan, user).await {
                    Ok(tz) => zone = Some(tz),
                    Err(err) => {
                        log.warn(format_args!("Failed to get time zone for {id}: {err}"));
                        return;
                    }
                }
            }
            let Some(zone) = zone.as_ref() else { return };

            let (message, attachment) = render_upcoming_event_as_attachment(event, zone, &[]);
            if let Err(err) = self.env().platform.dm_with_attachments(id, &message, vec![attachment]).await {
                log.warn(format_args!("Failed to send reminder to {id}: {err}"));
                continue;
            }
            debug!(user_id = %id, event = %event.ical_uid, "Sent upcoming event reminder");

            self.post_to_linked_channels(event, zone).await;
        }
    }

    async fn post_to_linked_channels(&self, event: &Event, zone: &TimeZoneName) {
        let metadata = match self.store().load_event_metadata(&event.ical_uid).await {
            Ok(metadata) => metadata,
            Err(err) if err.is_not_found() => return,
            Err(err) => {
                warn!(event = %event.ical_uid, error = %err, "Failed to load event metadata");
                return;
            }
        };

        let options = [RenderOption::ShowTimezone(zone.clone())];
        for channel_id in &metadata.linked_channel_ids {
            let post = Post {
                channel_id: channel_id.clone(),
                message: CHANNEL_REMINDER_MESSAGE.to_string(),
                attachments: vec![render_event_as_attachment(event, zone, &options)],
                ..Post::default()
            };
            if let Err(err) = self.env().platform.create_post(post).await {
                warn!(channel_id = %channel_id, error = %err, "Failed to post channel reminder");
            }
        }
    }
}
