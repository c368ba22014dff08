//! Logging helpers shared by the engine loops.

pub mod limited_log;

pub use limited_log::{LimitedLog, DEFAULT_LOG_LIMIT};
