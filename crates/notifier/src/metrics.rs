//! Process-wide delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters of delivery outcomes since process start.
///
/// `failed` is the number of notifications that were lost to provider errors;
/// callers never see those failures, so this is how operators notice them.
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    sent: AtomicU64,
    dry_run: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub sent: u64,
    pub dry_run: u64,
    pub failed: u64,
}

impl DeliveryMetrics {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dry_run(&self) {
        self.dry_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            dry_run: self.dry_run.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
