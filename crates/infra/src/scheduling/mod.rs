//! Periodic engine jobs
//!
//! [`EngineScheduler`] registers the status sync, daily summary and
//! subscription renewal jobs on a `tokio-cron-scheduler` instance. Each job:
//! - never overlaps with itself (a tick that finds the previous run still
//!   going is skipped)
//! - is bounded by a timeout
//! - reports runs, failures, skips and timeouts to [`JobMetrics`]
//!
//! [`JobMetrics`]: crate::observability::metrics::JobMetrics

pub mod engine_scheduler;
pub mod error;

pub use engine_scheduler::{EngineJob, EngineScheduler, EngineSchedulerConfig, JobRun, JobRunner};
pub use error::{SchedulerError, SchedulerResult};
