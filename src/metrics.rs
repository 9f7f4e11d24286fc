// Performance metrics module
//
// Provides lightweight counters for remote operations and state traffic

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Session metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// Collected for the lifetime of the application and logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Operations started through the lifecycle wrapper
    pub operations_started: AtomicUsize,

    /// Wrapped operations that failed
    pub operations_failed: AtomicUsize,

    /// Successful edits
    pub edits_applied: AtomicUsize,

    /// Successful analyses (quick and prompted)
    pub analyses_completed: AtomicUsize,

    /// Successful generations
    pub images_generated: AtomicUsize,

    /// Chat replies received
    pub chat_turns: AtomicUsize,

    /// Chat sends that failed
    pub chat_failures: AtomicUsize,

    /// Time spent inside wrapped operations, in milliseconds
    pub total_operation_time_ms: AtomicU64,

    /// Number of state updates performed
    pub state_updates: AtomicU64,

    /// Number of state broadcasts sent
    pub state_broadcasts: AtomicU64,

    /// Broadcasts with no live receiver
    pub state_broadcast_errors: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            operations_started: AtomicUsize::new(0),
            operations_failed: AtomicUsize::new(0),
            edits_applied: AtomicUsize::new(0),
            analyses_completed: AtomicUsize::new(0),
            images_generated: AtomicUsize::new(0),
            chat_turns: AtomicUsize::new(0),
            chat_failures: AtomicUsize::new(0),
            total_operation_time_ms: AtomicU64::new(0),
            state_updates: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            state_broadcast_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_operation_started(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation_time(&self, duration: Duration) {
        self.total_operation_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_edit_applied(&self) {
        self.edits_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis(&self) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image_generated(&self) {
        self.images_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chat_turn(&self) {
        self.chat_turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chat_failure(&self) {
        self.chat_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_update(&self) {
        self.state_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast_error(&self) {
        self.state_broadcast_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average wrapped-operation time in milliseconds
    pub fn avg_operation_time_ms(&self) -> f64 {
        let total = self.total_operation_time_ms.load(Ordering::Relaxed);
        let count = self.operations_started.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Operations: {} started, {} failed (avg: {:.2}ms)",
            self.operations_started.load(Ordering::Relaxed),
            self.operations_failed.load(Ordering::Relaxed),
            self.avg_operation_time_ms()
        );
        tracing::info!(
            "Results: {} edits, {} analyses, {} generated images",
            self.edits_applied.load(Ordering::Relaxed),
            self.analyses_completed.load(Ordering::Relaxed),
            self.images_generated.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Chat: {} replies, {} failures",
            self.chat_turns.load(Ordering::Relaxed),
            self.chat_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "State updates: {}, broadcasts: {}, unheard: {}",
            self.state_updates.load(Ordering::Relaxed),
            self.state_broadcasts.load(Ordering::Relaxed),
            self.state_broadcast_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.operations_started.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.chat_turns.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_results() {
        let metrics = Metrics::new();

        metrics.record_edit_applied();
        metrics.record_edit_applied();
        metrics.record_analysis();
        metrics.record_image_generated();
        metrics.record_chat_turn();
        metrics.record_chat_failure();

        assert_eq!(metrics.edits_applied.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.analyses_completed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.images_generated.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.chat_turns.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.chat_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_avg_operation_time() {
        let metrics = Metrics::new();

        metrics.record_operation_started();
        metrics.record_operation_time(Duration::from_millis(100));
        metrics.record_operation_started();
        metrics.record_operation_time(Duration::from_millis(300));

        assert_eq!(metrics.total_operation_time_ms.load(Ordering::Relaxed), 400);
        assert_eq!(metrics.avg_operation_time_ms(), 200.0);
    }

    #[test]
    fn test_avg_operation_time_without_operations() {
        assert_eq!(Metrics::new().avg_operation_time_ms(), 0.0);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
