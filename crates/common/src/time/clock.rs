//! Time abstraction for testability
//!
//! Engine decisions (reminder windows, post times, token expiry) all read
//! "now" through a [`Clock`] so tests can pin it.
//!
//! ```
//! use calsync_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::at("2024-01-01T09:00:00Z").unwrap();
//! clock.advance(chrono::Duration::minutes(5));
//! assert_eq!(clock.now().to_rfc3339(), "2024-01-01T09:05:00+00:00");
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{CommonError, CommonResult};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests. Clones share the same time.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(now)) }
    }

    /// Start at an RFC 3339 timestamp.
    pub fn at(rfc3339: &str) -> CommonResult<Self> {
        let now = DateTime::parse_from_rfc3339(rfc3339)
            .map_err(|e| CommonError::validation("rfc3339", e.to_string()))?;
        Ok(Self::new(now.with_timezone(&Utc)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
