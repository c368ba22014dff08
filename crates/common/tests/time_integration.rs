//! Integration tests for the injectable clock

#![cfg(feature = "runtime")]

use std::sync::Arc;

use calsync_common::{Clock, MockClock, SystemClock};

#[test]
fn mock_clock_behind_trait_object_tracks_advances() {
    let mock = MockClock::at("2024-02-29T23:58:00Z").expect("clock");
    let clock: Arc<dyn Clock> = Arc::new(mock.clone());

    mock.advance(chrono::Duration::minutes(3));

    assert_eq!(clock.now().to_rfc3339(), "2024-03-01T00:01:00+00:00");
}

#[test]
fn system_clock_is_close_to_utc_now() {
    let delta = chrono::Utc::now() - SystemClock.now();
    assert!(delta.num_seconds().abs() < 5);
}
