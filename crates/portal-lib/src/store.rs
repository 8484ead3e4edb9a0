//! Normalized entity store
//!
//! One [`Collection`] per entity kind plus the singleton pointers
//! (logged-in user, latest rotation). The store is the only shared mutable
//! state in the client:
//! - Writes go through the `request_many` / `receive_one` / `settle_one` /
//!   `receive_patch` / `remove_one` / `set_singleton` contract
//! - Each write holds the lock for its synchronous duration only, so writes
//!   are atomic relative to each other but may land in response-arrival order
//! - Every write bumps a revision published on a `watch` channel

use crate::models::{
    EmailData, Entity, EntityData, EntityId, ProjectData, RotationData, UserData,
};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Entity kind addressable in the store and on the API
pub trait Resource: Send + Sync + 'static {
    type Data: EntityData + Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync;

    /// Human-readable kind name used in logs and errors
    const KIND: &'static str;
    /// Root path of the kind's API collection
    const COLLECTION_PATH: &'static str;
    /// Relation under which list resources enumerate entities of this kind
    const LIST_RELATION: &'static str;

    fn collection(state: &StoreState) -> &Collection<Self::Data>;
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self::Data>;
}

macro_rules! resource {
    ($marker:ident, $data:ty, $field:ident, $kind:literal, $path:literal, $relation:literal) => {
        #[doc = concat!("Marker for the ", $kind, " collection")]
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl Resource for $marker {
            type Data = $data;
            const KIND: &'static str = $kind;
            const COLLECTION_PATH: &'static str = $path;
            const LIST_RELATION: &'static str = $relation;

            fn collection(state: &StoreState) -> &Collection<$data> {
                &state.$field
            }

            fn collection_mut(state: &mut StoreState) -> &mut Collection<$data> {
                &mut state.$field
            }
        }
    };
}

resource!(Project, ProjectData, projects, "project", "/api/projects", "projects");
resource!(User, UserData, users, "user", "/api/users", "users");
resource!(Rotation, RotationData, rotations, "rotation", "/api/rotations", "rotations");
resource!(Email, EmailData, emails, "email", "/api/emails", "emails");

/// Mapping from id to entity plus the count of outstanding requests
#[derive(Debug, Clone)]
pub struct Collection<D> {
    entities: BTreeMap<EntityId, Entity<D>>,
    pending: i64,
}

impl<D> Default for Collection<D> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            pending: 0,
        }
    }
}

impl<D> Collection<D> {
    pub fn get(&self, id: EntityId) -> Option<&Entity<D>> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity<D>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Outstanding requests expected to resolve into this collection
    pub fn pending(&self) -> i64 {
        self.pending
    }
}

/// Non-collection scalars kept beside the collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Singleton {
    LoggedInUser,
    LatestRotation,
}

/// Everything the store holds
#[derive(Debug, Default)]
pub struct StoreState {
    projects: Collection<ProjectData>,
    users: Collection<UserData>,
    rotations: Collection<RotationData>,
    emails: Collection<EmailData>,
    logged_in_user: Option<EntityId>,
    latest_rotation: Option<EntityId>,
}

/// Targeted update of named sub-fields of an entity
pub trait EntityPatch<D> {
    fn apply(&self, entity: &mut Entity<D>);
}

/// Partial patch of a project; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
    pub cogs_marker_id: Option<Option<EntityId>>,
    pub student_uploaded: Option<bool>,
    pub grace_passed: Option<bool>,
    /// `Some(path)` sets the relation, `None` removes it
    pub links: BTreeMap<String, Option<String>>,
}

impl EntityPatch<ProjectData> for ProjectPatch {
    fn apply(&self, entity: &mut Entity<ProjectData>) {
        if let Some(marker) = self.cogs_marker_id {
            entity.data.cogs_marker_id = marker;
        }
        if let Some(uploaded) = self.student_uploaded {
            entity.data.student_uploaded = uploaded;
        }
        if let Some(grace) = self.grace_passed {
            entity.data.grace_passed = grace;
        }
        for (relation, path) in &self.links {
            match path {
                Some(path) => {
                    entity.links.insert(relation.clone(), path.clone());
                }
                None => {
                    entity.links.remove(relation);
                }
            }
        }
    }
}

/// The client's single shared entity cache
pub struct EntityStore {
    state: RwLock<StoreState>,
    revision: watch::Sender<u64>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create an empty store with zeroed counters
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(StoreState::default()),
            revision,
        }
    }

    /// Receiver that observes a new revision after every applied write
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let result = {
            let mut state = self.state.write();
            f(&mut state)
        };
        self.revision.send_modify(|revision| *revision += 1);
        result
    }

    /// Count `n` requests whose results will land in `R`'s collection
    pub fn request_many<R: Resource>(&self, n: usize) {
        self.write(|state| {
            let collection = R::collection_mut(state);
            collection.pending += n as i64;
            debug!(kind = R::KIND, requested = n, pending = collection.pending, "Requests counted");
        });
    }

    /// Settle one counted request and whole-entity replace the received entity
    pub fn receive_one<R: Resource>(&self, entity: Entity<R::Data>) {
        self.write(|state| {
            let collection = R::collection_mut(state);
            collection.pending -= 1;
            if collection.pending < 0 {
                warn!(kind = R::KIND, pending = collection.pending, "Pending counter went negative");
            }
            collection.entities.insert(entity.id(), entity);
        });
    }

    /// Settle one counted request that produced no entity
    pub fn settle_one<R: Resource>(&self) {
        self.write(|state| {
            let collection = R::collection_mut(state);
            collection.pending -= 1;
            if collection.pending < 0 {
                warn!(kind = R::KIND, pending = collection.pending, "Pending counter went negative");
            }
        });
    }

    /// Merge a partial patch into a stored entity. Returns false if `id` is absent.
    pub fn receive_patch<R: Resource>(&self, id: EntityId, patch: &impl EntityPatch<R::Data>) -> bool {
        self.write(|state| match R::collection_mut(state).entities.get_mut(&id) {
            Some(entity) => {
                patch.apply(entity);
                true
            }
            None => {
                debug!(kind = R::KIND, id, "Patch for absent entity ignored");
                false
            }
        })
    }

    /// Delete an entity; absent ids are a no-op
    pub fn remove_one<R: Resource>(&self, id: EntityId) -> Option<Entity<R::Data>> {
        self.write(|state| R::collection_mut(state).entities.remove(&id))
    }

    pub fn set_singleton(&self, key: Singleton, value: Option<EntityId>) {
        self.write(|state| match key {
            Singleton::LoggedInUser => state.logged_in_user = value,
            Singleton::LatestRotation => state.latest_rotation = value,
        });
    }

    pub fn singleton(&self, key: Singleton) -> Option<EntityId> {
        let state = self.state.read();
        match key {
            Singleton::LoggedInUser => state.logged_in_user,
            Singleton::LatestRotation => state.latest_rotation,
        }
    }

    pub fn get<R: Resource>(&self, id: EntityId) -> Option<Entity<R::Data>> {
        R::collection(&self.state.read()).get(id).cloned()
    }

    pub fn pending<R: Resource>(&self) -> i64 {
        R::collection(&self.state.read()).pending
    }

    pub fn ids<R: Resource>(&self) -> Vec<EntityId> {
        R::collection(&self.state.read()).ids()
    }

    /// Point-in-time copy of a whole collection
    pub fn snapshot<R: Resource>(&self) -> Collection<R::Data> {
        R::collection(&self.state.read()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: EntityId, title: &str) -> Entity<ProjectData> {
        serde_json::from_value(serde_json::json!({
            "data": {"id": id, "title": title, "series": 2018, "part": 1, "cogs_marker_id": 3},
            "links": {"self": format!("/api/projects/{}", id), "cogs_marker": "/api/users/3"}
        }))
        .unwrap()
    }

    #[test]
    fn test_request_then_receive_restores_pending() {
        let store = EntityStore::new();
        store.request_many::<Project>(2);
        let before = store.pending::<Project>();

        store.request_many::<Project>(4);
        assert_eq!(store.pending::<Project>(), before + 4);

        for id in [4, 1, 3, 2] {
            store.receive_one::<Project>(project(id, "p"));
        }
        assert_eq!(store.pending::<Project>(), before);
    }

    #[test]
    fn test_request_zero_is_noop_on_counter() {
        let store = EntityStore::new();
        store.request_many::<User>(0);
        assert_eq!(store.pending::<User>(), 0);
    }

    #[test]
    fn test_receive_one_is_idempotent_on_stored_value() {
        let store = EntityStore::new();
        store.request_many::<Project>(2);
        store.receive_one::<Project>(project(1, "same"));
        let first = store.get::<Project>(1);
        store.receive_one::<Project>(project(1, "same"));

        assert_eq!(store.get::<Project>(1), first);
    }

    #[test]
    fn test_receive_one_replaces_whole_entity() {
        let store = EntityStore::new();
        store.request_many::<Project>(2);
        store.receive_one::<Project>(project(1, "old"));

        let mut replacement = project(1, "new");
        replacement.links.clear();
        replacement.data.cogs_marker_id = None;
        store.receive_one::<Project>(replacement.clone());

        assert_eq!(store.get::<Project>(1), Some(replacement));
    }

    #[test]
    fn test_receive_distinct_ids_commutes() {
        let a = EntityStore::new();
        let b = EntityStore::new();
        a.request_many::<Project>(2);
        b.request_many::<Project>(2);

        a.receive_one::<Project>(project(1, "one"));
        a.receive_one::<Project>(project(2, "two"));
        b.receive_one::<Project>(project(2, "two"));
        b.receive_one::<Project>(project(1, "one"));

        assert_eq!(a.ids::<Project>(), b.ids::<Project>());
        assert_eq!(a.get::<Project>(1), b.get::<Project>(1));
        assert_eq!(a.get::<Project>(2), b.get::<Project>(2));
    }

    #[test]
    fn test_remove_one() {
        let store = EntityStore::new();
        assert!(store.remove_one::<Project>(99).is_none());

        store.request_many::<Project>(1);
        store.receive_one::<Project>(project(5, "p"));
        assert!(store.remove_one::<Project>(5).is_some());
        assert!(store.get::<Project>(5).is_none());
        assert_eq!(store.pending::<Project>(), 0);
    }

    #[test]
    fn test_receive_patch_touches_only_named_fields() {
        let store = EntityStore::new();
        store.request_many::<Project>(1);
        store.receive_one::<Project>(project(10, "kept"));

        let patch = ProjectPatch {
            cogs_marker_id: Some(None),
            links: BTreeMap::from([("cogs_marker".to_string(), None)]),
            ..Default::default()
        };
        assert!(store.receive_patch::<Project>(10, &patch));
        assert!(!store.receive_patch::<Project>(11, &patch));

        let patched = store.get::<Project>(10).unwrap();
        assert_eq!(patched.data.cogs_marker_id, None);
        assert_eq!(patched.data.title, "kept");
        assert!(patched.link("cogs_marker").is_none());
        assert_eq!(patched.link("self"), Some("/api/projects/10"));
        assert_eq!(store.pending::<Project>(), 0);
    }

    #[test]
    fn test_settle_one_can_go_negative() {
        let store = EntityStore::new();
        store.settle_one::<Email>();
        assert_eq!(store.pending::<Email>(), -1);
    }

    #[test]
    fn test_singletons_and_revision() {
        let store = EntityStore::new();
        let rx = store.subscribe();
        assert_eq!(store.singleton(Singleton::LoggedInUser), None);

        store.set_singleton(Singleton::LoggedInUser, Some(8));
        store.set_singleton(Singleton::LatestRotation, Some(2));

        assert_eq!(store.singleton(Singleton::LoggedInUser), Some(8));
        assert_eq!(store.singleton(Singleton::LatestRotation), Some(2));
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_collections_are_separate() {
        let store = EntityStore::new();
        store.request_many::<Project>(3);
        assert_eq!(store.pending::<User>(), 0);
        assert_eq!(store.pending::<Rotation>(), 0);
        assert!(store.snapshot::<Project>().is_empty());
    }

    #[test]
    fn test_subscriber_wakes_on_write() {
        let store = std::sync::Arc::new(EntityStore::new());
        let mut rx = store.subscribe();

        let writer = store.clone();
        tokio_test::block_on(async move {
            writer.receive_one::<Project>(project(1, "a"));
            tokio_test::assert_ok!(rx.changed().await);
            assert_eq!(*rx.borrow_and_update(), 1);
        });
        assert_eq!(store.pending::<Project>(), -1);
    }
}
