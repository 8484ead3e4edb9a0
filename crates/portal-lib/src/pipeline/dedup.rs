//! De-duplication and short-lived caching of read calls
//!
//! Identical reads (same method, normalized path and body fingerprint) that
//! overlap in time share one network call. A fulfilled read is then served
//! from the cache until its TTL passes or a mutating call touches the same
//! resource family.

use super::transport::{ApiRequest, ApiResponse, RequestBody};
use crate::error::ApiError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::form_urlencoded;

/// Roots whose listings change when the key root is mutated
const DEPENDENT_ROOTS: &[(&str, &[&str])] = &[
    ("projects", &["series", "users"]),
    ("rotations", &["series"]),
];

type CallResult = Result<ApiResponse, ApiError>;
type SharedCall = Shared<BoxFuture<'static, CallResult>>;

/// Identity of a call for de-duplication purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: String,
    path: String,
    fingerprint: String,
}

impl RequestKey {
    pub fn for_request(request: &ApiRequest) -> Self {
        Self {
            method: request.method.as_str().to_string(),
            path: normalize_path(&request.path),
            fingerprint: fingerprint(request),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Strip origin, collapse empty segments, drop trailing slash and sort query pairs
pub fn normalize_path(raw: &str) -> String {
    let (path, query) = match url::Url::parse(raw) {
        Ok(url) => (url.path().to_string(), url.query().map(str::to_string)),
        Err(_) => match raw.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (raw.to_string(), None),
        },
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut normalized = format!("/{}", segments.join("/"));

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        pairs.sort();
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        normalized.push('?');
        normalized.push_str(&encoded);
    }

    normalized
}

fn fingerprint(request: &ApiRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", request.response_kind).as_bytes());
    match &request.body {
        RequestBody::Empty => {}
        RequestBody::Json(value) => hasher.update(value.to_string().as_bytes()),
        RequestBody::Multipart {
            field,
            file_name,
            bytes,
        } => {
            hasher.update(field.as_bytes());
            hasher.update(file_name.as_bytes());
            hasher.update(bytes);
        }
    }
    hex::encode(hasher.finalize())
}

/// Resource family of a normalized path: `/api/projects/7/file` -> `projects`
fn family_root(path: &str) -> Option<&str> {
    let path = path.split('?').next().unwrap_or(path);
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match segments.next()? {
        "api" => segments.next(),
        other => Some(other),
    }
}

fn affected_roots(path: &str) -> Vec<String> {
    let Some(root) = family_root(path) else {
        return Vec::new();
    };
    let mut roots = vec![root.to_string()];
    if let Some((_, dependents)) = DEPENDENT_ROOTS.iter().find(|(key, _)| *key == root) {
        roots.extend(dependents.iter().map(|r| r.to_string()));
    }
    roots
}

enum EntryState {
    InFlight(SharedCall),
    Fulfilled(ApiResponse),
}

struct CacheEntry {
    state: EntryState,
    generation: u64,
    expires_at: Option<Instant>,
}

enum Found {
    Fresh(ApiResponse),
    Stale,
    InFlight(SharedCall, u64),
}

impl CacheEntry {
    fn in_flight(call: SharedCall, generation: u64) -> Self {
        Self {
            state: EntryState::InFlight(call),
            generation,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// How a read was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from a fulfilled entry
    Hit,
    /// Joined an identical call already in flight
    Joined,
    /// Issued a new network call
    Miss,
}

/// Keyed cache of in-flight and fulfilled reads
pub struct DedupCache {
    entries: DashMap<RequestKey, CacheEntry>,
    ttl: Duration,
    generations: AtomicU64,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            generations: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a read, sharing an in-flight call or a fresh result when one exists
    pub async fn get_or_fetch<F>(&self, key: RequestKey, fetch: F) -> (CallResult, CacheOutcome)
    where
        F: FnOnce() -> BoxFuture<'static, CallResult>,
    {
        let now = Instant::now();
        self.purge_expired(now);

        let (call, generation, outcome) = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let found = {
                    let entry = occupied.get();
                    match &entry.state {
                        EntryState::Fulfilled(response) if !entry.is_expired(now) => {
                            Found::Fresh(response.clone())
                        }
                        EntryState::Fulfilled(_) => Found::Stale,
                        EntryState::InFlight(call) => Found::InFlight(call.clone(), entry.generation),
                    }
                };
                match found {
                    Found::Fresh(response) => {
                        debug!(path = %key.path, "Read served from cache");
                        return (Ok(response), CacheOutcome::Hit);
                    }
                    Found::InFlight(call, generation) => (call, generation, CacheOutcome::Joined),
                    Found::Stale => {
                        let (call, generation) = self.start(fetch);
                        occupied.insert(CacheEntry::in_flight(call.clone(), generation));
                        (call, generation, CacheOutcome::Miss)
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let (call, generation) = self.start(fetch);
                vacant.insert(CacheEntry::in_flight(call.clone(), generation));
                (call, generation, CacheOutcome::Miss)
            }
        };

        if outcome == CacheOutcome::Joined {
            debug!(path = %key.path, "Joined in-flight read");
        }

        let result = call.await;
        self.settle(&key, generation, &result);
        (result, outcome)
    }

    fn start<F>(&self, fetch: F) -> (SharedCall, u64)
    where
        F: FnOnce() -> BoxFuture<'static, CallResult>,
    {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        (fetch().shared(), generation)
    }

    /// Record a settled call; a stale generation means the entry was invalidated meanwhile
    fn settle(&self, key: &RequestKey, generation: u64, result: &CallResult) {
        let discard = match self.entries.get_mut(key) {
            Some(mut entry)
                if entry.generation == generation
                    && matches!(entry.state, EntryState::InFlight(_)) =>
            {
                match result {
                    Ok(response) => {
                        entry.state = EntryState::Fulfilled(response.clone());
                        entry.expires_at = Some(Instant::now() + self.ttl);
                        false
                    }
                    Err(_) => true,
                }
            }
            _ => false,
        };

        if discard {
            self.entries.remove_if(key, |_, entry| entry.generation == generation);
        }
    }

    /// Drop every entry in the resource family of `path`. Returns how many were removed.
    pub fn invalidate_related(&self, path: &str) -> usize {
        let roots = affected_roots(&normalize_path(path));
        if roots.is_empty() {
            return 0;
        }

        let before = self.entries.len();
        self.entries.retain(|key, _| {
            family_root(&key.path).map_or(true, |root| !roots.iter().any(|r| r == root))
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(path = %path, removed, "Invalidated cached reads");
        }
        removed
    }

    fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}
