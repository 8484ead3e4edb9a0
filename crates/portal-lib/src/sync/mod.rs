//! Synchronization operations against the portal API
//!
//! This module provides:
//! - [`SyncClient`], which issues calls through the [`RequestPipeline`] and
//!   applies their results to the [`EntityStore`]
//! - Generic list/get/create/edit/delete over every entity kind
//! - Project operations: upload (optimistic), download, marking, bulk marker assignment
//! - Session operations: logged-in user and latest rotation

mod collections;
mod projects;
mod session;


pub use projects::{download_file_name, UserProjects};

use crate::error::{ApiError, SyncError};
use crate::models::{Entity, EntityId};
use crate::observability::{StructuredLogger, SyncMetrics};
use crate::pipeline::{ApiRequest, HttpTransport, RequestPipeline, Transport};
use crate::store::{EntityStore, Resource};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the sync client
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// API root (e.g., "http://localhost:5000")
    pub api_url: String,
    /// Per-request timeout enforced by the HTTP client. The sync layer itself
    /// never cancels or times out a call; this only bounds the HTTP transport.
    pub request_timeout: Duration,
    /// How long a fulfilled read is served from the dedup cache
    pub dedup_ttl: Duration,
    /// Directory project downloads are written to
    pub download_dir: PathBuf,
    /// Label attached to structured log events
    pub session: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            request_timeout: Duration::from_secs(30),
            dedup_ttl: Duration::from_secs(10),
            download_dir: PathBuf::from("."),
            session: "default".to_string(),
        }
    }
}

/// Optional callbacks run when an operation settles, before it returns
pub struct Hooks<T> {
    on_success: Option<Box<dyn FnOnce(&T) + Send>>,
    on_failure: Option<Box<dyn FnOnce(&SyncError) + Send>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_failure: None,
        }
    }
}

impl<T> Hooks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(&SyncError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    fn succeed(self, value: &T) {
        if let Some(f) = self.on_success {
            f(value);
        }
    }

    fn fail(self, error: &SyncError) {
        if let Some(f) = self.on_failure {
            f(error);
        }
    }
}

/// Result of a list-fetch; individual item failures are reported here, not raised
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOutcome {
    /// Number of items the list resource linked to
    pub requested: usize,
    /// Ids stored, in completion order
    pub received: Vec<EntityId>,
    /// Paths whose fetch failed
    pub failed: Vec<String>,
}

impl ListOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Issues API calls and keeps the entity store in step with their results
pub struct SyncClient {
    config: SyncConfig,
    pipeline: Arc<RequestPipeline>,
    store: Arc<EntityStore>,
    logger: StructuredLogger,
    metrics: SyncMetrics,
}

impl SyncClient {
    /// Create a client talking HTTP to `config.api_url` with a fresh store
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        SyncClientBuilder::new().config(config).build()
    }

    pub fn builder() -> SyncClientBuilder {
        SyncClientBuilder::new()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// GET and decode one entity without touching the store
    async fn fetch_entity<R: Resource>(&self, path: &str) -> Result<Entity<R::Data>, ApiError> {
        self.pipeline.call(ApiRequest::get(path)).await?.parse()
    }

    /// GET one entity for a request already counted against `R`
    async fn fetch_counted<R: Resource>(&self, path: &str) -> Result<Entity<R::Data>, SyncError> {
        match self.fetch_entity::<R>(path).await {
            Ok(entity) => {
                self.store.receive_one::<R>(entity.clone());
                Ok(entity)
            }
            Err(err) => {
                self.store.settle_one::<R>();
                Err(err.into())
            }
        }
    }

    /// Apply the settled result of a counted create/edit call and run the hooks
    fn finish_write<R: Resource>(
        &self,
        action: &str,
        result: Result<Entity<R::Data>, ApiError>,
        hooks: Hooks<Entity<R::Data>>,
    ) -> Result<Entity<R::Data>, SyncError> {
        match result {
            Ok(entity) => {
                self.store.receive_one::<R>(entity.clone());
                self.logger.log_entity_changed(R::KIND, action, entity.id());
                hooks.succeed(&entity);
                Ok(entity)
            }
            Err(err) => {
                self.store.settle_one::<R>();
                Err(self.reject_write::<R>(action, err.into(), hooks))
            }
        }
    }

    /// Report a failed create/edit and run the failure hook
    fn reject_write<R: Resource>(
        &self,
        action: &str,
        err: SyncError,
        hooks: Hooks<Entity<R::Data>>,
    ) -> SyncError {
        self.logger
            .log_operation_failed(&format!("{} {}", action, R::KIND), &err.status_message());
        hooks.fail(&err);
        err
    }
}

fn encode(payload: &impl Serialize) -> Result<serde_json::Value, SyncError> {
    serde_json::to_value(payload).map_err(|e| SyncError::Encode(e.to_string()))
}

/// Builder for SyncClient configuration
pub struct SyncClientBuilder {
    config: SyncConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<EntityStore>>,
}

impl SyncClientBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
            transport: None,
            store: None,
        }
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn dedup_ttl(mut self, ttl: Duration) -> Self {
        self.config.dedup_ttl = ttl;
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.download_dir = dir.into();
        self
    }

    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.config.session = session.into();
        self
    }

    /// Use a custom transport instead of HTTP
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing store instead of creating one
    pub fn store(mut self, store: Arc<EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<SyncClient, SyncError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                &self.config.api_url,
                self.config.request_timeout,
            )?),
        };

        Ok(SyncClient {
            pipeline: Arc::new(RequestPipeline::new(transport, self.config.dedup_ttl)),
            store: self.store.unwrap_or_default(),
            logger: StructuredLogger::new(self.config.session.clone()),
            metrics: SyncMetrics::new(),
            config: self.config,
        })
    }
}

impl Default for SyncClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
