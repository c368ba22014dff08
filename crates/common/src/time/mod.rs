//! Injectable wall clock.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
