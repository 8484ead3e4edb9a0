//! Request pipeline
//!
//! Every call to the API passes through two interceptors:
//! - De-duplication/caching of reads, with invalidation by mutating calls
//! - Normalization of failed responses into [`ApiError`]

mod dedup;
mod errors;
mod transport;

pub use dedup::{normalize_path, CacheOutcome, DedupCache, RequestKey};
pub use errors::normalize_failure;
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, RequestBody, ResponseKind, Transport,
};

use crate::error::ApiError;
use crate::observability::SyncMetrics;
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Transport wrapped by the dedup and error-normalization interceptors
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    cache: DedupCache,
    metrics: SyncMetrics,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn Transport>, dedup_ttl: Duration) -> Self {
        Self {
            transport,
            cache: DedupCache::new(dedup_ttl),
            metrics: SyncMetrics::new(),
        }
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    /// Issue one call. Reads may be shared with identical concurrent callers.
    pub async fn call(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if request.is_read() {
            let key = RequestKey::for_request(&request);
            let transport = self.transport.clone();
            let metrics = self.metrics.clone();
            let (result, outcome) = self
                .cache
                .get_or_fetch(key, move || dispatch(transport, metrics, request).boxed())
                .await;
            if outcome != CacheOutcome::Miss {
                self.metrics.inc_dedup_hits();
            }
            return result;
        }

        // Invalidate on issue so reads started during the mutation miss the cache,
        // and again on settle so reads that raced it are not kept.
        let path = request.path.clone();
        self.invalidate(&path);
        let result = dispatch(self.transport.clone(), self.metrics.clone(), request).await;
        self.invalidate(&path);
        result
    }

    fn invalidate(&self, path: &str) {
        let removed = self.cache.invalidate_related(path);
        if removed > 0 {
            self.metrics.add_cache_invalidations(removed);
        }
    }
}

async fn dispatch(
    transport: Arc<dyn Transport>,
    metrics: SyncMetrics,
    request: ApiRequest,
) -> Result<ApiResponse, ApiError> {
    debug!(method = %request.method, path = %request.path, "Sending request");
    metrics.inc_requests_sent(request.method.as_str());

    let started = Instant::now();
    let sent = transport.send(&request).await;
    metrics.observe_request_latency(started.elapsed().as_secs_f64());

    let response = sent.map_err(|e| {
        metrics.inc_request_failures(e.kind());
        warn!(method = %request.method, path = %request.path, error = %e, "Request not delivered");
        e
    })?;

    if response.is_success() {
        return Ok(response);
    }

    let error = normalize_failure(&response, request.response_kind);
    metrics.inc_request_failures(error.kind());
    debug!(
        method = %request.method,
        path = %request.path,
        status = response.status,
        message = %error.status_message(),
        "Request rejected"
    );
    Err(error)
}
