//! Webhook intake counters

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct WebhookMetrics {
    received: AtomicU64,
    enqueued: AtomicU64,
    /// Dropped because the processor queue was full or stopped
    rejected: AtomicU64,
}

impl WebhookMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, count: usize) {
        self.received.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self, count: usize) {
        self.enqueued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, count: usize) {
        self.rejected.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// `(received, enqueued, rejected)`
    pub fn totals(&self) -> (u64, u64, u64) {
        (
            self.received.load(Ordering::Relaxed),
            self.enqueued.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        )
    }
}
