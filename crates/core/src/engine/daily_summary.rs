//! Daily agenda delivery
//!
//! The job runs every [`DAILY_SUMMARY_JOB_INTERVAL`]; a user gets their agenda
//! on the weekday tick that falls within [`DAILY_SUMMARY_TIME_WINDOW`] of
//! their chosen post time, at most once per window.

use calsync_common::LimitedLog;
use calsync_domain::constants::{DAILY_SUMMARY_JOB_INTERVAL, DAILY_SUMMARY_TIME_WINDOW};
use calsync_domain::{
    sort_by_start, Attachment, CalsyncError, DailySummarySettings, Event, Result, TimeZoneName,
};
use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Timelike, Utc,
    Weekday,
};
use tracing::{debug, info};

use super::fetch::ViewRequest;
use super::{Engine, OperationContext};
use crate::views::{render_calendar_view, render_day_summary};

const KITCHEN_PARSE: &str = "%I:%M%p";

/// Parse a `3:04PM` style time. The meridiem may be in either case.
pub fn parse_kitchen(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(&value.trim().to_uppercase(), KITCHEN_PARSE).ok()
}

/// Whether the agenda is due at `now` under these settings
pub fn should_post_daily_summary(dsum: &DailySummarySettings, now: DateTime<Utc>) -> Result<bool> {
    if !dsum.enable {
        return Ok(false);
    }

    if !dsum.last_post_time.is_empty() {
        let last = DateTime::parse_from_rfc3339(&dsum.last_post_time).map_err(|_| {
            CalsyncError::Validation(format!(
                "Failed to parse last post time: {}",
                dsum.last_post_time
            ))
        })?;
        if now - last.with_timezone(&Utc) < DAILY_SUMMARY_TIME_WINDOW {
            return Ok(false);
        }
    }

    let tz = dsum
        .timezone
        .to_tz()
        .ok_or_else(|| CalsyncError::Validation("invalid timezone".to_string()))?;
    let post_time = parse_kitchen(&dsum.post_time).ok_or_else(|| {
        CalsyncError::Validation(format!("Invalid time value: {}", dsum.post_time))
    })?;

    let local_now = now.with_timezone(&tz);
    if matches!(local_now.weekday(), Weekday::Sat | Weekday::Sun) {
        return Ok(false);
    }

    let Some(target) = tz.from_local_datetime(&local_now.date_naive().and_time(post_time)).earliest()
    else {
        return Ok(false);
    };
    Ok((local_now - target).abs() < DAILY_SUMMARY_TIME_WINDOW)
}

/// `[00:00, 24:00)` of `day` in `zone`, as UTC instants
pub fn day_window(day: NaiveDate, zone: &TimeZoneName) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let tz = zone.tz_or_utc();
    let start = tz.from_local_datetime(&day.and_hms_opt(0, 0, 0)?).earliest()?;
    let start = start.with_timezone(&Utc);
    Some((start, start + Duration::hours(24)))
}

/// The local day containing `now` in `zone`
pub fn today_window(now: DateTime<Utc>, zone: &TimeZoneName) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    day_window(now.with_timezone(&zone.tz_or_utc()).date_naive(), zone)
}

impl Engine {
    /// Post the agenda to every user whose post time has come. Returns the
    /// number of agendas sent.
    pub async fn process_all_daily_summary(&self) -> Result<usize> {
        let index = match self.store().load_user_index().await {
            Ok(index) => index,
            Err(err) if err.is_not_found() => return Ok(0),
            Err(err) => return Err(err),
        };
        if index.is_empty() {
            return Ok(0);
        }

        let plan = self.fetch_plan().await?;
        let now = self.now();
        let log = LimitedLog::new("daily summary");

        let mut requests = Vec::new();
        for entry in &index {
            let user = match self.store().load_user(&entry.platform_user_id).await {
                Ok(user) => user,
                Err(err) => {
                    log.warn(format_args!(
                        "Error loading user {} for daily summary: {err}",
                        entry.platform_user_id
                    ));
                    continue;
                }
            };
            let Some(dsum) = user.settings.daily_summary.as_ref() else {
                continue;
            };
            match should_post_daily_summary(dsum, now) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    log.warn(format_args!(
                        "Error checking daily summary for user {}: {err}",
                        entry.platform_user_id
                    ));
                    continue;
                }
            }
            if let Some((start, end)) = today_window(now, &dsum.timezone) {
                requests.push(ViewRequest::new(user, start, end));
            }
        }
        if requests.is_empty() {
            return Ok(0);
        }

        let fetched = self.fetch_calendar_views(&plan, requests, &log).await?;
        let mut posted = 0;
        for view in fetched.views {
            let id = &view.user.platform_user_id;
            let Some(dsum) = view.user.settings.daily_summary.as_ref() else {
                continue;
            };
            let mut events = view.events;
            sort_by_start(&mut events);

            let text = match render_calendar_view(&events, &dsum.timezone) {
                Ok(text) => text,
                Err(err) => {
                    log.warn(format_args!("Error rendering calendar for user {id}: {err}"));
                    continue;
                }
            };
            if let Err(err) = self.env().platform.dm(id, &text).await {
                log.warn(format_args!("Error posting daily summary for user {id}: {err}"));
                continue;
            }
            posted += 1;

            if let Err(err) = self.store_last_post_time(id, now).await {
                log.warn(format_args!("Error storing daily summary post time for {id}: {err}"));
            }
        }

        info!(posted, "Processed daily summary");
        Ok(posted)
    }

    async fn store_last_post_time(&self, platform_user_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut user = self.store().load_user(platform_user_id).await?;
        user.settings.daily_summary.get_or_insert_with(DailySummarySettings::default).last_post_time =
            now.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.store().store_user(&user).await
    }

    pub async fn get_daily_summary_settings(
        &self,
        platform_user_id: &str,
    ) -> Result<DailySummarySettings> {
        let user = self.store().load_user(platform_user_id).await?;
        Ok(user.settings.daily_summary_or_default())
    }

    /// Set the post time and refresh the stored zone from the mailbox
    pub async fn set_daily_summary_post_time(
        &self,
        platform_user_id: &str,
        value: &str,
    ) -> Result<DailySummarySettings> {
        let post_time = parse_kitchen(value)
            .ok_or_else(|| CalsyncError::Validation(format!("Invalid time value: {value}")))?;
        let interval_minutes = DAILY_SUMMARY_JOB_INTERVAL.as_secs() / 60;
        if u64::from(post_time.minute()) % interval_minutes != 0 {
            return Err(CalsyncError::Validation(format!(
                "time must be a multiple of {interval_minutes} minutes"
            )));
        }

        let mut ctx = self.context().acting_user(platform_user_id).build().await?;
        let zone = self.mailbox_time_zone(&ctx).await?;

        let dsum = ctx.user.settings.daily_summary.get_or_insert_with(DailySummarySettings::default);
        dsum.post_time = value.to_string();
        dsum.timezone = zone;
        let dsum = dsum.clone();
        self.store().store_user(&ctx.user).await?;
        debug!(user_id = %platform_user_id, post_time = %dsum.post_time, "Daily summary time set");
        Ok(dsum)
    }

    pub async fn set_daily_summary_enabled(
        &self,
        platform_user_id: &str,
        enable: bool,
    ) -> Result<DailySummarySettings> {
        let mut user = self.store().load_user(platform_user_id).await?;
        let dsum = user.settings.daily_summary.get_or_insert_with(DailySummarySettings::default);
        dsum.enable = enable;
        let dsum = dsum.clone();
        self.store().store_user(&user).await?;
        Ok(dsum)
    }

    /// Today's agenda as a markdown message
    pub async fn get_daily_summary_for_user(&self, platform_user_id: &str) -> Result<String> {
        let ctx = self.context().acting_user(platform_user_id).build().await?;
        let zone = self.mailbox_time_zone(&ctx).await?;
        let day = self.now().with_timezone(&zone.tz_or_utc()).date_naive();
        let events = self.day_events(&ctx, day, &zone).await?;
        render_calendar_view(&events, &zone)
    }

    /// Agenda for `day` as a message plus one attachment per event
    pub async fn get_day_summary_for_user(
        &self,
        day: NaiveDate,
        platform_user_id: &str,
    ) -> Result<(String, Vec<Attachment>)> {
        let ctx = self.context().acting_user(platform_user_id).build().await?;
        let zone = self.mailbox_time_zone(&ctx).await?;
        let events = self.day_events(&ctx, day, &zone).await?;
        Ok(render_day_summary(&events, &zone))
    }

    async fn mailbox_time_zone(&self, ctx: &OperationContext) -> Result<TimeZoneName> {
        Ok(ctx.client.get_mailbox_settings(&ctx.user.remote.id).await?.time_zone)
    }

    async fn day_events(
        &self,
        ctx: &OperationContext,
        day: NaiveDate,
        zone: &TimeZoneName,
    ) -> Result<Vec<Event>> {
        let (start, end) = day_window(day, zone)
            .ok_or_else(|| CalsyncError::Validation(format!("no local midnight on {day}")))?;
        let mut events = ctx.client.calendar_view(&ctx.user.remote.id, start, end).await?;
        events.retain(|e| !e.is_declined());
        sort_by_start(&mut events);
        Ok(events)
    }
}
