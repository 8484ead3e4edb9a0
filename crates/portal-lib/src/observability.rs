//! Observability for the sync core
//!
//! Provides:
//! - Prometheus metrics (request counts, dedup hits, invalidations, failures, latency)
//! - Structured event logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for API round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SyncMetricsInner> = OnceLock::new();

struct SyncMetricsInner {
    requests_sent: IntCounterVec,
    dedup_hits: IntCounter,
    cache_invalidations: IntCounter,
    request_failures: IntCounterVec,
    request_latency_seconds: Histogram,
    list_items_dropped: IntCounter,
}

impl SyncMetricsInner {
    fn new() -> Self {
        Self {
            requests_sent: register_int_counter_vec!(
                "portal_sync_requests_sent_total",
                "Requests sent over the network, by HTTP method",
                &["method"]
            )
            .expect("Failed to register requests_sent"),

            dedup_hits: register_int_counter!(
                "portal_sync_dedup_hits_total",
                "Reads satisfied by an in-flight or cached identical call"
            )
            .expect("Failed to register dedup_hits"),

            cache_invalidations: register_int_counter!(
                "portal_sync_cache_invalidations_total",
                "Cached reads dropped because a mutating call touched their resource family"
            )
            .expect("Failed to register cache_invalidations"),

            request_failures: register_int_counter_vec!(
                "portal_sync_request_failures_total",
                "Failed requests, by normalized error kind",
                &["kind"]
            )
            .expect("Failed to register request_failures"),

            request_latency_seconds: register_histogram!(
                "portal_sync_request_latency_seconds",
                "Round-trip time of API requests",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            list_items_dropped: register_int_counter!(
                "portal_sync_list_items_dropped_total",
                "List-fetch items whose individual fetch failed"
            )
            .expect("Failed to register list_items_dropped"),
        }
    }
}

/// Handle to the process-wide sync metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct SyncMetrics {
    _private: (),
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    /// Create a metrics handle (registers the global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SyncMetricsInner {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new)
    }

    pub fn inc_requests_sent(&self, method: &str) {
        self.inner().requests_sent.with_label_values(&[method]).inc();
    }

    pub fn inc_dedup_hits(&self) {
        self.inner().dedup_hits.inc();
    }

    pub fn add_cache_invalidations(&self, count: usize) {
        self.inner().cache_invalidations.inc_by(count as u64);
    }

    pub fn inc_request_failures(&self, kind: &str) {
        self.inner().request_failures.with_label_values(&[kind]).inc();
    }

    pub fn observe_request_latency(&self, duration_secs: f64) {
        self.inner().request_latency_seconds.observe(duration_secs);
    }

    pub fn add_list_items_dropped(&self, count: usize) {
        self.inner().list_items_dropped.inc_by(count as u64);
    }

    /// Total requests sent for a method since process start
    pub fn requests_sent(&self, method: &str) -> u64 {
        self.inner().requests_sent.with_label_values(&[method]).get()
    }
}

/// Structured logger for sync events
///
/// Emits named events so front ends and log pipelines can follow
/// operations without parsing message text.
#[derive(Clone)]
pub struct StructuredLogger {
    session: String,
}

impl StructuredLogger {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Log the outcome of a list-fetch
    pub fn log_list_fetched(&self, kind: &str, path: &str, requested: usize, failed: usize) {
        if failed == 0 {
            info!(
                event = "list_fetched",
                session = %self.session,
                kind = %kind,
                path = %path,
                requested = requested,
                "Fetched entity list"
            );
        } else {
            warn!(
                event = "list_fetched",
                session = %self.session,
                kind = %kind,
                path = %path,
                requested = requested,
                failed = failed,
                "Fetched entity list with missing items"
            );
        }
    }

    /// Log an entity written by a create, edit or delete
    pub fn log_entity_changed(&self, kind: &str, action: &str, id: i64) {
        info!(
            event = "entity_changed",
            session = %self.session,
            kind = %kind,
            action = %action,
            id = id,
            "Entity changed on server"
        );
    }

    /// Log a failed operation that was reported to its caller
    pub fn log_operation_failed(&self, operation: &str, message: &str) {
        warn!(
            event = "operation_failed",
            session = %self.session,
            operation = %operation,
            message = %message,
            "Sync operation failed"
        );
    }

    /// Log an upload whose local flag was set before the server confirmed
    pub fn log_upload(&self, id: i64, success: bool) {
        if success {
            info!(
                event = "project_uploaded",
                session = %self.session,
                id = id,
                "Project file uploaded"
            );
        } else {
            warn!(
                event = "project_upload_failed",
                session = %self.session,
                id = id,
                "Project upload failed, local upload flag left as is"
            );
        }
    }

    /// Log a bulk marker assignment
    pub fn log_bulk_patch(&self, kind: &str, patched: usize) {
        info!(
            event = "bulk_patch_applied",
            session = %self.session,
            kind = %kind,
            patched = patched,
            "Bulk assignment applied to store"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_metrics_creation() {
        let metrics = SyncMetrics::new();
        let before = metrics.requests_sent("PATCH");

        metrics.inc_requests_sent("PATCH");
        metrics.inc_dedup_hits();
        metrics.add_cache_invalidations(2);
        metrics.inc_request_failures("http");
        metrics.observe_request_latency(0.01);
        metrics.add_list_items_dropped(1);

        assert_eq!(metrics.requests_sent("PATCH"), before + 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("cli");
        assert_eq!(logger.session(), "cli");
    }
}
