//! Status sync, daily summary and subscription renewal jobs.
//!
//! The scheduler tracks its cancellation token and wraps every asynchronous
//! lifecycle call in a timeout. Job bodies go through [`JobRunner`], which
//! [`Engine`] implements; tests drive the scheduler with a recording runner.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use calsync_core::Engine;
use calsync_domain::constants::{
    DAILY_SUMMARY_JOB_INTERVAL, RENEW_JOB_INTERVAL, STATUS_SYNC_JOB_INTERVAL,
};
use calsync_domain::{EngineConfig, Result};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::log_metric;
use crate::observability::metrics::JobMetrics;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Background jobs the engine runs on a fixed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineJob {
    StatusSync,
    DailySummary,
    Renewal,
}

impl EngineJob {
    pub const ALL: [EngineJob; 3] = [Self::StatusSync, Self::DailySummary, Self::Renewal];

    pub fn name(self) -> &'static str {
        match self {
            Self::StatusSync => "status_sync",
            Self::DailySummary => "daily_summary",
            Self::Renewal => "subscription_renewal",
        }
    }

    pub fn default_interval(self) -> Duration {
        match self {
            Self::StatusSync => STATUS_SYNC_JOB_INTERVAL,
            Self::DailySummary => DAILY_SUMMARY_JOB_INTERVAL,
            Self::Renewal => RENEW_JOB_INTERVAL,
        }
    }

    fn enabled(self, config: &EngineConfig) -> bool {
        match self {
            Self::StatusSync => config.enable_status_sync,
            Self::DailySummary => config.enable_daily_summary,
            Self::Renewal => config.enable_renewal,
        }
    }
}

/// Executes one run of a job and returns a short description of the outcome
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: EngineJob) -> Result<String>;
}

#[async_trait]
impl JobRunner for Engine {
    async fn run(&self, job: EngineJob) -> Result<String> {
        match job {
            EngineJob::StatusSync => {
                let report = self.sync_all().await?;
                info!(
                    processed = report.summary.processed,
                    status_changed = report.summary.status_changed,
                    status_failed = report.summary.status_failed,
                    "Status sync summary"
                );
                Ok(report.message)
            }
            EngineJob::DailySummary => {
                let posted = self.process_all_daily_summary().await?;
                Ok(format!("posted {posted} daily summaries"))
            }
            EngineJob::Renewal => {
                let renewed = self.renew_all().await?;
                Ok(format!("renewed {renewed} subscriptions"))
            }
        }
    }
}

/// Configuration for the engine scheduler.
#[derive(Debug, Clone)]
pub struct EngineSchedulerConfig {
    /// Jobs to register, with the interval each repeats on.
    pub jobs: Vec<(EngineJob, Duration)>,
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
}

impl Default for EngineSchedulerConfig {
    fn default() -> Self {
        Self {
            jobs: EngineJob::ALL.iter().map(|job| (*job, job.default_interval())).collect(),
            job_timeout: Duration::from_secs(10 * 60),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineSchedulerConfig {
    /// Default intervals, keeping only the jobs enabled in `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut scheduler = Self::default();
        scheduler.jobs.retain(|(job, _)| job.enabled(config));
        scheduler
    }
}

/// What happened to one tick of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRun {
    Completed,
    Failed,
    TimedOut,
    /// The previous run still held the job lock
    Skipped,
    Cancelled,
}

/// Scheduler for the engine's periodic jobs with explicit lifecycle management.
pub struct EngineScheduler {
    scheduler: Option<JobScheduler>,
    config: EngineSchedulerConfig,
    runner: Arc<dyn JobRunner>,
    metrics: Arc<JobMetrics>,
    cancellation: CancellationToken,
}

impl EngineScheduler {
    pub fn new(
        config: EngineSchedulerConfig,
        runner: Arc<dyn JobRunner>,
        metrics: Arc<JobMetrics>,
    ) -> Self {
        for (job, _) in &config.jobs {
            metrics.register(job.name());
        }
        Self { scheduler: None, config, runner, metrics, cancellation: CancellationToken::new() }
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();
        let scheduler = self.build_scheduler().await?;

        let start_timeout = self.config.start_timeout;
        tokio::time::timeout(start_timeout, scheduler.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?
            .map_err(|err| SchedulerError::StartFailed(err.to_string()))?;

        self.scheduler = Some(scheduler);
        info!(jobs = self.config.jobs.len(), "Engine scheduler started");
        Ok(())
    }

    /// Stop the scheduler. A job in flight is cancelled.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, scheduler.shutdown())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?
            .map_err(|err| SchedulerError::StopFailed(err.to_string()))?;

        info!("Engine scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler =
            JobScheduler::new().await.map_err(|err| SchedulerError::CreationFailed(err.to_string()))?;

        for &(job, interval) in &self.config.jobs {
            let runner = self.runner.clone();
            let metrics = self.metrics.clone();
            let cancel = self.cancellation.clone();
            let running = Arc::new(Mutex::new(()));
            let job_timeout = self.config.job_timeout;

            let definition = Job::new_repeated_async(interval, move |_id, _lock| {
                let runner = runner.clone();
                let metrics = metrics.clone();
                let cancel = cancel.clone();
                let running = running.clone();

                Box::pin(async move {
                    run_guarded(job, &running, job_timeout, &cancel, &metrics, runner.run(job))
                        .await;
                })
            })
            .map_err(|err| SchedulerError::JobRegistrationFailed(err.to_string()))?;

            let job_id = scheduler
                .add(definition)
                .await
                .map_err(|err| SchedulerError::JobRegistrationFailed(err.to_string()))?;
            debug!(job = job.name(), interval_secs = interval.as_secs(), %job_id, "Registered job");
        }

        Ok(scheduler)
    }
}

/// Run one tick of `job`: skip if the previous run is still going, otherwise
/// run `work` under the timeout until it finishes or `cancel` fires.
pub(crate) async fn run_guarded<F>(
    job: EngineJob,
    running: &Mutex<()>,
    job_timeout: Duration,
    cancel: &CancellationToken,
    metrics: &JobMetrics,
    work: F,
) -> JobRun
where
    F: Future<Output = Result<String>>,
{
    let name = job.name();
    let Ok(_running) = running.try_lock() else {
        log_metric(metrics.record_skip(name), "scheduler.job.skipped");
        debug!(job = name, "Previous run still in progress, skipping");
        return JobRun::Skipped;
    };

    info!(job = name, "Job started");
    let started = Instant::now();

    let outcome = tokio::select! {
        _ = cancel.cancelled() => None,
        result = tokio::time::timeout(job_timeout, work) => Some(result),
    };

    match outcome {
        None => {
            warn!(job = name, "Job cancelled");
            JobRun::Cancelled
        }
        Some(Ok(Ok(message))) => {
            log_metric(metrics.record_run(name, started.elapsed()), "scheduler.job.duration");
            info!(
                job = name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                %message,
                "Job completed"
            );
            JobRun::Completed
        }
        Some(Ok(Err(err))) => {
            log_metric(metrics.record_run(name, started.elapsed()), "scheduler.job.duration");
            log_metric(metrics.record_failure(name), "scheduler.job.failure");
            error!(job = name, error = %err, "Job failed");
            JobRun::Failed
        }
        Some(Err(_)) => {
            log_metric(metrics.record_timeout(name), "scheduler.job.timeout");
            warn!(job = name, timeout_secs = job_timeout.as_secs(), "Job timed out");
            JobRun::TimedOut
        }
    }
}
