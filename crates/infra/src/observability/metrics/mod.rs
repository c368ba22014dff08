//! Metrics collection modules

pub mod jobs;
pub mod webhook;

pub use jobs::{JobMetrics, JobSnapshot};
pub use webhook::WebhookMetrics;
