//! Engine tunables
//!
//! Centralized location for all domain-level constants used throughout the
//! engine. Durations are expressed as `std::time::Duration` or
//! `chrono::Duration` depending on whether they drive a timer or wall-clock
//! arithmetic.

use std::time::Duration;

// Job cadence
pub const STATUS_SYNC_JOB_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DAILY_SUMMARY_JOB_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const RENEW_JOB_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// Calendar windows
pub const CALENDAR_VIEW_TIME_WINDOW_SIZE: chrono::Duration = chrono::Duration::minutes(10);
pub const UPCOMING_EVENT_NOTIFICATION_TIME: chrono::Duration = chrono::Duration::minutes(10);
/// 1.1 × the status sync interval so reminders falling between ticks are kept.
pub const UPCOMING_EVENT_NOTIFICATION_WINDOW: chrono::Duration = chrono::Duration::seconds(330);
pub const DAILY_SUMMARY_TIME_WINDOW: chrono::Duration = chrono::Duration::minutes(2);

// Fan-out
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const FANOUT_DEADLINE: Duration = Duration::from_secs(5 * 60);

// Remote batching
pub const MAX_NUM_REQUESTS_PER_BATCH: usize = 20;

// Notification processor
pub const MAX_QUEUE_SIZE: usize = 1024;

// Subscriptions
pub const SUBSCRIBE_TTL: chrono::Duration = chrono::Duration::hours(48);
pub const RENEW_SUBSCRIPTION_BEFORE_EXPIRATION: chrono::Duration = chrono::Duration::hours(12);
pub const DITHER_RENEW: Duration = Duration::from_millis(50);
pub const SUBSCRIPTION_CHANGE_TYPE: &str = "created,updated,deleted";
pub const CLIENT_STATE_BYTES: usize = 96;

// Event snapshots
pub const TTL_AFTER_EVENT_END: chrono::Duration = chrono::Duration::days(30);
pub const DEFAULT_EVENT_TTL: chrono::Duration = chrono::Duration::days(30);

// Tokens
pub const TOKEN_REFRESH_LEEWAY: chrono::Duration = chrono::Duration::minutes(5);
pub const OAUTH2_STATE_TTL: chrono::Duration = chrono::Duration::minutes(15);

// Store
pub const MODIFY_INDEX_MAX_ATTEMPTS: usize = 20;
pub const MODIFY_INDEX_BACKOFF: Duration = Duration::from_millis(30);
pub const MODIFY_INDEX_MAX_BACKOFF: Duration = Duration::from_millis(500);

// Logging
pub const LOG_TRUNCATE_LIMIT: usize = 5;
pub const LOG_TRUNCATE_MSG: &str = "Too many warnings. Truncating the rest of the messages.";

// Custom status
pub const CUSTOM_STATUS_EMOJI: &str = "calendar";
pub const CUSTOM_STATUS_TEXT: &str = "In a meeting";

// Daily summary defaults
pub const DEFAULT_DAILY_SUMMARY_POST_TIME: &str = "8:00AM";
pub const DEFAULT_DAILY_SUMMARY_TIMEZONE: &str = "Eastern Standard Time";

// User-facing messages
pub const USER_INACTIVE_MESSAGE: &str = "You have been marked inactive because your refresh token is expired. Please disconnect and reconnect your account again.";
pub const NO_UPCOMING_EVENTS_MESSAGE: &str = "You have no upcoming events.";
