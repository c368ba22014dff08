//! Status sync: `Sync`, `SyncAll` and the per-user status update pass
//!
//! One sync reads every eligible user's calendar for the next
//! [`CALENDAR_VIEW_TIME_WINDOW_SIZE`], emits reminders, then drives presence
//! and custom status from the busy events found.

use std::collections::HashMap;

use calsync_common::LimitedLog;
use calsync_domain::constants::{
    CALENDAR_VIEW_TIME_WINDOW_SIZE, CUSTOM_STATUS_EMOJI, CUSTOM_STATUS_TEXT,
};
use calsync_domain::{
    sort_by_start, CustomStatus, Event, JobSummary, PlatformStatus, PresenceStatus, Result,
    StatusOption, User, UserIndex,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::fetch::{UserView, ViewRequest};
use super::status::{decide, LastStatusUpdate, StatusAction, StatusInput, Transition};
use super::{Engine, FetchPlan};
use crate::views::render_status_change_attachment;

/// Outcome of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub message: String,
    pub summary: JobSummary,
}

impl SyncReport {
    fn message(message: impl Into<String>, summary: JobSummary) -> Self {
        Self { message: message.into(), summary }
    }
}

/// Short events separated by a short gap still count as one busy block.
const MERGE_GAP: Duration = Duration::minutes(5);

const CUSTOM_STATUS_DURATION: &str = "date_and_time";

impl Engine {
    /// Sync a single connected user
    pub async fn sync(&self, platform_user_id: &str) -> Result<SyncReport> {
        let entry = self.store().load_user_from_index(platform_user_id).await?;
        let plan = self.fetch_plan().await?;
        self.sync_users(&plan, &UserIndex::single(entry)).await
    }

    /// Sync every user in the index
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let plan = self.fetch_plan().await?;
        let index = match self.store().load_user_index().await {
            Ok(index) => index,
            Err(err) if err.is_not_found() => {
                return Ok(SyncReport::message("No users found in user index", JobSummary::default()))
            }
            Err(err) => return Err(err),
        };
        self.sync_users(&plan, &index).await
    }

    async fn sync_users(&self, plan: &FetchPlan, index: &UserIndex) -> Result<SyncReport> {
        let mut summary = JobSummary::default();
        if index.is_empty() {
            return Ok(SyncReport::message("No connected users found", summary));
        }
        summary.processed = index.len();

        let log = LimitedLog::new("status sync");
        let users = self.load_users_to_sync(index, &mut summary, &log).await;
        if users.is_empty() {
            return Ok(SyncReport::message("no users need to be synced", summary));
        }

        let now = self.now();
        let requests = users
            .into_iter()
            .map(|user| ViewRequest::new(user, now, now + CALENDAR_VIEW_TIME_WINDOW_SIZE))
            .collect();
        let fetched = self.fetch_calendar_views(plan, requests, &log).await?;
        summary.status_failed += fetched.failed;
        if fetched.views.is_empty() {
            return Ok(SyncReport::message("no calendar views found", summary));
        }
        if fetched.deadline_exceeded {
            warn!(views = fetched.views.len(), "Syncing partial results after fan-out deadline");
        }

        let mut views = fetched.views;
        for view in &mut views {
            sort_by_start(&mut view.events);
        }

        self.deliver_reminders(plan, &views).await;
        let message = self.set_user_statuses(&views, &mut summary, &log).await?;
        Ok(SyncReport { message, summary })
    }

    /// Full records of every index entry that wants syncing
    pub(crate) async fn load_users_to_sync(
        &self,
        index: &UserIndex,
        summary: &mut JobSummary,
        log: &LimitedLog,
    ) -> Vec<User> {
        let mut users = Vec::with_capacity(index.len());
        for entry in index {
            match self.store().load_user(&entry.platform_user_id).await {
                Ok(user) if user.settings.wants_sync() => users.push(user),
                Ok(_) => {}
                Err(err) => {
                    summary.status_failed += 1;
                    log.warn(format_args!(
                        "Not able to load user {}: {err}",
                        entry.platform_user_id
                    ));
                }
            }
        }
        users
    }

    /// Drive presence and custom status from each view
    pub(crate) async fn set_user_statuses(
        &self,
        views: &[UserView],
        summary: &mut JobSummary,
        log: &LimitedLog,
    ) -> Result<String> {
        let ids: Vec<String> = views
            .iter()
            .filter(|v| {
                v.user.settings.is_configured_for_status_updates()
                    || v.user.settings.is_configured_for_custom_status_updates()
            })
            .map(|v| v.user.platform_user_id.clone())
            .collect();
        if ids.is_empty() {
            return Ok("No users want their status updated".to_string());
        }

        let statuses: HashMap<String, PlatformStatus> = self
            .env()
            .platform
            .get_user_statuses(&ids)
            .await?
            .into_iter()
            .map(|s| (s.user_id.clone(), s))
            .collect();

        let mut last_reason = "";
        for view in views {
            let user = &view.user;
            let Some(status) = statuses.get(&user.platform_user_id) else {
                continue;
            };
            let busy = busy_events(&view.events);

            if let Some(busy_status) = user.settings.busy_status() {
                match self.set_status_from_calendar_view(user, busy_status, status, &busy).await {
                    Ok(transition) => {
                        last_reason = transition.reason;
                        if transition.changed {
                            summary.status_changed += 1;
                        }
                    }
                    Err(err) => {
                        summary.status_failed += 1;
                        log.warn(format_args!(
                            "Error setting user {} status: {err}",
                            user.platform_user_id
                        ));
                        continue;
                    }
                }
            }

            if user.settings.is_configured_for_custom_status_updates() {
                match self.set_custom_status_from_calendar_view(user, &busy).await {
                    Ok(changed) => {
                        if changed
                            && user.settings.effective_status_option() == StatusOption::NotSet
                        {
                            summary.status_changed += 1;
                        }
                    }
                    Err(err) => {
                        summary.status_failed += 1;
                        log.warn(format_args!(
                            "Error setting user {} custom status: {err}",
                            user.platform_user_id
                        ));
                    }
                }
            }
        }

        info!(
            processed = summary.processed,
            changed = summary.status_changed,
            failed = summary.status_failed,
            "Status sync pass complete"
        );
        if last_reason.is_empty() {
            last_reason = "Status sync complete";
        }
        Ok(last_reason.to_string())
    }

    async fn set_status_from_calendar_view(
        &self,
        user: &User,
        busy_status: PresenceStatus,
        status: &PlatformStatus,
        busy: &[Event],
    ) -> Result<Transition> {
        let fingerprints: Vec<String> = busy.iter().filter_map(Event::fingerprint).collect();
        let transition = decide(&StatusInput {
            busy_status,
            current: status.status,
            manual: status.manual,
            get_confirmation: user.settings.get_confirmation,
            last_status: user.last_status,
            active_events: &user.active_events,
            remote_fingerprints: &fingerprints,
        });
        debug!(user_id = %user.platform_user_id, reason = transition.reason, "Status decision");

        if !transition.is_noop() {
            self.apply_transition(user, &transition, busy).await?;
        }
        Ok(transition)
    }

    /// Persist the transition on a fresh load of the user, then act on it.
    /// The record is reloaded because a token refresh may have rewritten it
    /// since the view was fetched.
    async fn apply_transition(
        &self,
        user: &User,
        transition: &Transition,
        busy: &[Event],
    ) -> Result<()> {
        let id = &user.platform_user_id;
        if transition.last_status != LastStatusUpdate::Keep || transition.active_events.is_some() {
            let mut stored = self.store().load_user(id).await?;
            if let LastStatusUpdate::Write(last) = transition.last_status {
                stored.last_status = last;
            }
            if let Some(active) = &transition.active_events {
                stored.active_events = active.clone();
            }
            self.store().store_user(&stored).await?;
        }

        match transition.action {
            StatusAction::None => {}
            StatusAction::Set(to) => {
                self.env().platform.update_user_status(id, to).await?;
            }
            StatusAction::Ask { to, is_free } => {
                let events = if is_free { &[][..] } else { busy };
                let attachment = render_status_change_attachment(
                    events,
                    to,
                    &self.env().settings.confirm_action_url,
                    self.now(),
                );
                self.env().platform.dm_with_attachments(id, "", vec![attachment]).await?;
            }
        }
        Ok(())
    }

    /// Returns true when a custom status was written. A status the user
    /// picked themselves is left alone.
    async fn set_custom_status_from_calendar_view(
        &self,
        user: &User,
        busy: &[Event],
    ) -> Result<bool> {
        let id = &user.platform_user_id;
        let platform = &self.env().platform;

        if busy.is_empty() {
            if user.is_custom_status_set {
                platform.remove_custom_status(id).await?;
                self.store().store_user_custom_status_updates(id, false).await?;
            }
            return Ok(false);
        }

        if platform.get_custom_status(id).await?.is_some() && !user.is_custom_status_set {
            return Ok(false);
        }

        let Some((_, end)) = merge_busy_blocks(busy).into_iter().next() else {
            return Ok(false);
        };
        let custom = CustomStatus {
            emoji: CUSTOM_STATUS_EMOJI.to_string(),
            text: CUSTOM_STATUS_TEXT.to_string(),
            expires_at: Some(end),
            duration: CUSTOM_STATUS_DURATION.to_string(),
        };
        platform.update_custom_status(id, &custom).await?;
        self.store().store_user_custom_status_updates(id, true).await?;
        Ok(true)
    }
}

/// Non-cancelled events shown as busy, in start order
pub(crate) fn busy_events(events: &[Event]) -> Vec<Event> {
    let mut busy: Vec<Event> =
        events.iter().filter(|e| e.is_busy()).cloned().collect();
    sort_by_start(&mut busy);
    busy
}

/// Collapse sorted busy events into `(start, end)` blocks. Overlapping or
/// touching events merge; so does a short event followed by another within
/// [`MERGE_GAP`].
pub(crate) fn merge_busy_blocks(events: &[Event]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut blocks: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for event in events {
        let (Some(start), Some(end)) = (event.start_utc(), event.end_utc()) else {
            continue;
        };
        if let Some(last) = blocks.last_mut() {
            let short = last.1 - last.0 <= MERGE_GAP;
            if last.1 >= start || (short && start - last.1 <= MERGE_GAP) {
                last.1 = last.1.max(end);
                continue;
            }
        }
        blocks.push((start, end));
    }
    blocks
}

impl From<SyncReport> for (String, JobSummary) {
    fn from(report: SyncReport) -> Self {
        (report.message, report.summary)
    }
}
