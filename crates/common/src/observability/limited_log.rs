//! Rate-limited log adapter
//!
//! Loops over many users must not flood the log when a remote is down. A
//! [`LimitedLog`] admits the first `limit` messages, then emits exactly one
//! truncation notice and silences the rest of the loop.
//!
//! ```rust
//! use calsync_common::observability::LimitedLog;
//!
//! let log = LimitedLog::new("sync");
//! for user in ["a", "b", "c"] {
//!     if log.admit() {
//!         tracing::warn!(user_id = user, "could not load user");
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

/// Messages admitted per loop before truncation.
pub const DEFAULT_LOG_LIMIT: usize = 5;

const TRUNCATED_MESSAGE: &str = "Too many warnings. Truncating the rest of the messages.";

#[derive(Debug)]
pub struct LimitedLog {
    context: &'static str,
    limit: usize,
    attempts: AtomicUsize,
}

impl LimitedLog {
    pub fn new(context: &'static str) -> Self {
        Self::with_limit(context, DEFAULT_LOG_LIMIT)
    }

    pub fn with_limit(context: &'static str, limit: usize) -> Self {
        Self { context, limit, attempts: AtomicUsize::new(0) }
    }

    /// Returns true when the caller should emit its message. The call that
    /// crosses the limit logs the truncation notice instead.
    pub fn admit(&self) -> bool {
        let n = self.attempts.fetch_add(1, Ordering::Relaxed);
        if n < self.limit {
            return true;
        }
        if n == self.limit {
            tracing::warn!(context = self.context, "{TRUNCATED_MESSAGE}");
        }
        false
    }

    /// Log a plain warning through the limiter.
    pub fn warn(&self, message: impl std::fmt::Display) {
        if self.admit() {
            tracing::warn!(context = self.context, "{message}");
        }
    }

    /// Log a plain error through the limiter.
    pub fn error(&self, message: impl std::fmt::Display) {
        if self.admit() {
            tracing::error!(context = self.context, "{message}");
        }
    }

    /// Number of messages attempted, including suppressed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Messages swallowed after the limit, excluding the truncation notice.
    pub fn suppressed(&self) -> usize {
        self.attempts().saturating_sub(self.limit + 1)
    }

    pub fn is_truncated(&self) -> bool {
        self.attempts() > self.limit
    }
}
