//! In-process metrics for background jobs and the webhook
//!
//! Record methods return `MetricsResult<()>` so callers can log a dropped
//! sample without failing the operation being measured.

pub mod metrics;

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Job names are fixed at startup; anything else is a programming error
    #[error("Unknown job: {job}")]
    UnknownJob { job: String },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Log a failed record call and carry on
pub fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        tracing::warn!(metric, error = %err, "Failed to record metric");
    }
}
