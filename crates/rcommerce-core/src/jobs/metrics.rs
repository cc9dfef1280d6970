//! Scheduler and executor metrics
//!
//! In-process counters, not a time-series store: embedding binaries scrape
//! `snapshot()` into whatever metrics backend they already run (the control
//! surface layer, not this crate, owns that wiring).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    missed_jobs_found: AtomicU64,
    added_to_queue: AtomicU64,
    failed_to_enqueue: AtomicU64,
    last_sync_duration_ms: AtomicU64,

    executions_succeeded: AtomicU64,
    executions_timed_out: AtomicU64,
    executions_failed: AtomicU64,
    total_execution_duration_ms: AtomicI64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_safety_sync(&self, missed_jobs_found: u64, added_to_queue: u64, failed_to_enqueue: u64, duration_ms: u64) {
        self.missed_jobs_found.fetch_add(missed_jobs_found, Ordering::Relaxed);
        self.added_to_queue.fetch_add(added_to_queue, Ordering::Relaxed);
        self.failed_to_enqueue.fetch_add(failed_to_enqueue, Ordering::Relaxed);
        self.last_sync_duration_ms.store(duration_ms, Ordering::Relaxed);

        info!(
            missed_jobs_found,
            added_to_queue,
            failed_to_enqueue,
            duration_ms,
            "safety_sync completed"
        );
    }

    pub fn record_execution_success(&self, duration_ms: i64) {
        self.executions_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_execution_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn record_execution_timeout(&self) {
        self.executions_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execution_failure(&self) {
        self.executions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            missed_jobs_found: self.missed_jobs_found.load(Ordering::Relaxed),
            added_to_queue: self.added_to_queue.load(Ordering::Relaxed),
            failed_to_enqueue: self.failed_to_enqueue.load(Ordering::Relaxed),
            last_sync_duration_ms: self.last_sync_duration_ms.load(Ordering::Relaxed),
            executions_succeeded: self.executions_succeeded.load(Ordering::Relaxed),
            executions_timed_out: self.executions_timed_out.load(Ordering::Relaxed),
            executions_failed: self.executions_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub missed_jobs_found: u64,
    pub added_to_queue: u64,
    pub failed_to_enqueue: u64,
    pub last_sync_duration_ms: u64,
    pub executions_succeeded: u64,
    pub executions_timed_out: u64,
    pub executions_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_safety_sync_accumulates() {
        let metrics = SchedulerMetrics::new();
        metrics.record_safety_sync(3, 3, 0, 12);
        metrics.record_safety_sync(1, 0, 1, 8);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.missed_jobs_found, 4);
        assert_eq!(snapshot.added_to_queue, 3);
        assert_eq!(snapshot.failed_to_enqueue, 1);
        assert_eq!(snapshot.last_sync_duration_ms, 8);
    }

    #[test]
    fn test_record_execution_outcomes() {
        let metrics = SchedulerMetrics::new();
        metrics.record_execution_success(150);
        metrics.record_execution_timeout();
        metrics.record_execution_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.executions_succeeded, 1);
        assert_eq!(snapshot.executions_timed_out, 1);
        assert_eq!(snapshot.executions_failed, 1);
    }
}
