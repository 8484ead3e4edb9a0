//! Operations shared by every entity kind

use super::{encode, Hooks, ListOutcome, SyncClient};
use crate::error::SyncError;
use crate::models::{Entity, EntityId, ListEnvelope};
use crate::pipeline::ApiRequest;
use crate::store::Resource;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

impl SyncClient {
    /// Fetch a list resource and every entity it links to
    ///
    /// All linked entities are requested concurrently and each is stored as
    /// soon as it arrives. An item whose fetch fails is left out of the store
    /// and reported in [`ListOutcome::failed`]; only failure to fetch the list
    /// resource itself is an error.
    pub async fn fetch_list<R: Resource>(&self, path: &str) -> Result<ListOutcome, SyncError> {
        let envelope: ListEnvelope = self.pipeline.call(ApiRequest::get(path)).await?.parse()?;
        let links = envelope.paths(R::LIST_RELATION);
        self.store.request_many::<R>(links.len());

        let fetches = links.iter().map(|link| async move {
            match self.fetch_entity::<R>(link).await {
                Ok(entity) => {
                    let id = entity.id();
                    self.store.receive_one::<R>(entity);
                    Ok(id)
                }
                Err(err) => {
                    self.store.settle_one::<R>();
                    warn!(kind = R::KIND, path = %link, error = %err, "Dropped list item");
                    Err(link.clone())
                }
            }
        });

        let mut outcome = ListOutcome {
            requested: links.len(),
            ..Default::default()
        };
        for result in join_all(fetches).await {
            match result {
                Ok(id) => outcome.received.push(id),
                Err(link) => outcome.failed.push(link),
            }
        }

        if !outcome.failed.is_empty() {
            self.metrics.add_list_items_dropped(outcome.failed.len());
        }
        self.logger
            .log_list_fetched(R::KIND, path, outcome.requested, outcome.failed.len());
        Ok(outcome)
    }

    /// Fetch every entity in the kind's root collection
    pub async fn fetch_all<R: Resource>(&self) -> Result<ListOutcome, SyncError> {
        self.fetch_list::<R>(R::COLLECTION_PATH).await
    }

    /// Fetch one entity by id
    pub async fn fetch_one<R: Resource>(&self, id: EntityId) -> Result<Entity<R::Data>, SyncError> {
        self.fetch_path::<R>(&format!("{}/{}", R::COLLECTION_PATH, id))
            .await
    }

    /// Fetch one entity from an arbitrary resource path (e.g. a link)
    pub async fn fetch_path<R: Resource>(&self, path: &str) -> Result<Entity<R::Data>, SyncError> {
        self.store.request_many::<R>(1);
        self.fetch_counted::<R>(path).await
    }

    /// POST a new entity; the created entity returned by the server is stored
    pub async fn create<R: Resource>(
        &self,
        payload: &impl Serialize,
        hooks: Hooks<Entity<R::Data>>,
    ) -> Result<Entity<R::Data>, SyncError> {
        let body = match encode(payload) {
            Ok(body) => body,
            Err(err) => return Err(self.reject_write::<R>("create", err, hooks)),
        };
        self.store.request_many::<R>(1);

        let result = match self
            .pipeline
            .call(ApiRequest::post(R::COLLECTION_PATH, body))
            .await
        {
            Ok(response) => response.parse(),
            Err(err) => Err(err),
        };
        self.finish_write::<R>("create", result, hooks)
    }

    /// PUT changes to an entity; the server's copy replaces the stored one
    pub async fn edit<R: Resource>(
        &self,
        id: EntityId,
        payload: &impl Serialize,
        hooks: Hooks<Entity<R::Data>>,
    ) -> Result<Entity<R::Data>, SyncError> {
        let body = match encode(payload) {
            Ok(body) => body,
            Err(err) => return Err(self.reject_write::<R>("edit", err, hooks)),
        };
        self.store.request_many::<R>(1);

        let path = format!("{}/{}", R::COLLECTION_PATH, id);
        let result = match self.pipeline.call(ApiRequest::put(path, body)).await {
            Ok(response) => response.parse(),
            Err(err) => Err(err),
        };
        self.finish_write::<R>("edit", result, hooks)
    }

    /// DELETE an entity and drop it from the store
    pub async fn delete<R: Resource>(&self, id: EntityId) -> Result<(), SyncError> {
        let path = format!("{}/{}", R::COLLECTION_PATH, id);
        self.pipeline.call(ApiRequest::delete(path)).await?;

        if self.store.remove_one::<R>(id).is_none() {
            debug!(kind = R::KIND, id, "Deleted entity was not loaded");
        }
        self.logger.log_entity_changed(R::KIND, "delete", id);
        Ok(())
    }
}
