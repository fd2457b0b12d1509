// Dispatch metrics module
//
// Lightweight counters for monitoring the source control worker

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source control dispatch metrics
///
/// Uses atomic operations so producer threads, the worker thread and the
/// direct status-query path can all record without taking a lock.
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Commands handed to the worker queue
    pub commands_dispatched: AtomicU64,

    /// Commands the worker finished (including faulted ones)
    pub commands_completed: AtomicU64,

    /// Commands whose provider call faulted
    pub commands_faulted: AtomicU64,

    /// Commands refused because no worker was running
    pub commands_rejected: AtomicU64,

    /// Commands whose provider result code was negative
    pub provider_errors: AtomicU64,

    /// Status queries executed directly on the calling thread
    pub direct_status_queries: AtomicU64,

    /// Total time spent inside provider calls, in microseconds
    pub total_provider_time_us: AtomicU64,

    start_time: Instant,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            commands_dispatched: AtomicU64::new(0),
            commands_completed: AtomicU64::new(0),
            commands_faulted: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            provider_errors: AtomicU64::new(0),
            direct_status_queries: AtomicU64::new(0),
            total_provider_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished provider call and how long it took
    pub fn record_completed(&self, elapsed: Duration) {
        self.commands_completed.fetch_add(1, Ordering::Relaxed);
        self.total_provider_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.commands_faulted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_error(&self) {
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_direct_status_query(&self) {
        self.direct_status_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average provider call time in milliseconds
    pub fn avg_provider_time_ms(&self) -> f64 {
        let total = self.total_provider_time_us.load(Ordering::Relaxed);
        let count = self.commands_completed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64 / 1000.0
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Source Control Dispatch Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Commands: {} dispatched, {} completed, {} faulted, {} rejected",
            self.commands_dispatched.load(Ordering::Relaxed),
            self.commands_completed.load(Ordering::Relaxed),
            self.commands_faulted.load(Ordering::Relaxed),
            self.commands_rejected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Provider errors: {}, direct status queries: {}",
            self.provider_errors.load(Ordering::Relaxed),
            self.direct_status_queries.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Provider time: {:.2}s (avg: {:.2}ms per call)",
            self.total_provider_time_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            self.avg_provider_time_ms()
        );
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
