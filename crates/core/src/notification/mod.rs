//! Webhook notification processing

pub mod processor;

pub use processor::{NotificationProcessor, ProcessorConfig, ProcessorError};
