//! Per-job run counters
//!
//! One entry per registered job name. Counters use `Relaxed` ordering: each
//! is independent and only read for reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::observability::{MetricsError, MetricsResult};

#[derive(Debug, Default)]
struct JobCounters {
    runs: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    /// Ticks skipped because the previous run was still going
    skipped: AtomicU64,
    last_duration_ms: AtomicU64,
}

/// Point-in-time copy of one job's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSnapshot {
    pub runs: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub skipped: u64,
    pub last_duration_ms: u64,
}

#[derive(Debug, Default)]
pub struct JobMetrics {
    jobs: DashMap<&'static str, JobCounters>,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `job` known; recording for unregistered jobs fails
    pub fn register(&self, job: &'static str) {
        self.jobs.entry(job).or_default();
    }

    fn with<F: FnOnce(&JobCounters)>(&self, job: &str, f: F) -> MetricsResult<()> {
        let counters =
            self.jobs.get(job).ok_or_else(|| MetricsError::UnknownJob { job: job.to_string() })?;
        f(&counters);
        Ok(())
    }

    pub fn record_run(&self, job: &str, duration: Duration) -> MetricsResult<()> {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.with(job, |c| {
            c.runs.fetch_add(1, Ordering::Relaxed);
            c.last_duration_ms.store(ms, Ordering::Relaxed);
        })
    }

    pub fn record_failure(&self, job: &str) -> MetricsResult<()> {
        self.with(job, |c| {
            c.failures.fetch_add(1, Ordering::Relaxed);
        })
    }

    pub fn record_timeout(&self, job: &str) -> MetricsResult<()> {
        self.with(job, |c| {
            c.timeouts.fetch_add(1, Ordering::Relaxed);
        })
    }

    pub fn record_skip(&self, job: &str) -> MetricsResult<()> {
        self.with(job, |c| {
            c.skipped.fetch_add(1, Ordering::Relaxed);
        })
    }

    pub fn snapshot(&self, job: &str) -> Option<JobSnapshot> {
        self.jobs.get(job).map(|c| JobSnapshot {
            runs: c.runs.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            last_duration_ms: c.last_duration_ms.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_job() {
        let metrics = JobMetrics::new();
        metrics.register("status_sync");
        metrics.register("renewal");

        metrics.record_run("status_sync", Duration::from_millis(120)).unwrap();
        metrics.record_run("status_sync", Duration::from_millis(80)).unwrap();
        metrics.record_failure("status_sync").unwrap();
        metrics.record_skip("renewal").unwrap();

        let sync = metrics.snapshot("status_sync").unwrap();
        assert_eq!(sync.runs, 2);
        assert_eq!(sync.failures, 1);
        assert_eq!(sync.last_duration_ms, 80);
        assert_eq!(metrics.snapshot("renewal").unwrap().skipped, 1);
    }

    #[test]
    fn unknown_job_is_reported() {
        let metrics = JobMetrics::new();
        assert!(matches!(
            metrics.record_failure("nope"),
            Err(MetricsError::UnknownJob { .. })
        ));
        assert!(metrics.snapshot("nope").is_none());
    }
}
