//! Query cache with stale-while-revalidate reads and request coalescing.
//!
//! Every remote read goes through [`QueryCache::fetch_or_serve`]. Concurrent
//! reads of the same descriptor share one request: the first reader registers a
//! broadcast channel on the entry and later readers subscribe to it until the
//! fetch completes. Fetches run on their own task, so a reader that goes away
//! never cancels a request others are waiting on.
//!
//! Only the fetch completion handler and the mutation coordinator write to
//! entries.

mod descriptor;

pub use descriptor::{QueryFamily, QueryKey, QueryKind, QueryValue};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};

use crate::errors::{ClientError, ClientResult};
use crate::remote::RecipeService;

type FetchResult = ClientResult<QueryValue>;

/// Freshness of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served without a request
    Fresh,
    /// Value (if any) may be outdated; the next read refetches
    Stale,
    /// A request is in flight
    Loading,
}

struct InFlightFetch {
    /// Unique per fetch; a completion only applies to the fetch it belongs to.
    id: u64,
    sender: broadcast::Sender<FetchResult>,
}

struct CacheEntry {
    value: Option<QueryValue>,
    freshness: Freshness,
    /// Bumped by every invalidation; a fetch started under an older epoch
    /// completes as Stale.
    epoch: u64,
    in_flight: Option<InFlightFetch>,
    last_error: Option<ClientError>,
    updated_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            value: None,
            freshness: Freshness::Stale,
            epoch: 0,
            in_flight: None,
            last_error: None,
            updated_at: None,
        }
    }
}

/// Snapshot of an entry for rendering while a refetch runs.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub value: Option<QueryValue>,
    pub freshness: Freshness,
    pub last_error: Option<ClientError>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub fetches_issued: u64,
    pub coalesced: u64,
    pub hits: u64,
}

#[derive(Default)]
struct Counters {
    fetches: AtomicU64,
    coalesced: AtomicU64,
    hits: AtomicU64,
}

/// Session-scoped query cache.
#[derive(Clone)]
pub struct QueryCache {
    service: Arc<dyn RecipeService>,
    entries: Arc<RwLock<HashMap<QueryKey, CacheEntry>>>,
    counters: Arc<Counters>,
}

impl QueryCache {
    pub fn new(service: Arc<dyn RecipeService>) -> Self {
        Self {
            service,
            entries: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Serve a fresh entry or fetch it, joining an in-flight request if one exists.
    ///
    /// On failure the previous value stays in the entry, the entry is marked
    /// stale and the error is returned.
    pub async fn fetch_or_serve(&self, key: &QueryKey) -> FetchResult {
        {
            let entries = self.entries.read().await;
            if let Some(value) = entries.get(key).and_then(fresh_value) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(?key, "Serving fresh cache entry");
                return Ok(value);
            }
        }

        let mut receiver = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::empty);

            // Re-check: another reader may have completed a fetch meanwhile
            if let Some(value) = fresh_value(entry) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }

            match entry.in_flight {
                Some(ref fetch) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(?key, "Joining in-flight fetch");
                    fetch.sender.subscribe()
                }
                None => {
                    let id = self.counters.fetches.fetch_add(1, Ordering::Relaxed) + 1;
                    let (sender, receiver) = broadcast::channel(1);
                    entry.in_flight = Some(InFlightFetch {
                        id,
                        sender: sender.clone(),
                    });
                    entry.freshness = Freshness::Loading;
                    self.spawn_fetch(key.clone(), id, entry.epoch, sender);
                    receiver
                }
            }
        };

        receiver
            .recv()
            .await
            .map_err(|_| ClientError::Internal("Fetch ended without a result".to_string()))?
    }

    fn spawn_fetch(
        &self,
        key: QueryKey,
        fetch_id: u64,
        epoch: u64,
        sender: broadcast::Sender<FetchResult>,
    ) {
        tracing::debug!(?key, fetch_id, epoch, "Fetching");

        let cache = self.clone();
        tokio::spawn(async move {
            let result = key.load(cache.service.as_ref()).await;
            cache.complete(&key, fetch_id, epoch, &result).await;
            // No receivers left is fine: every reader went away
            let _ = sender.send(result);
        });
    }

    async fn complete(&self, key: &QueryKey, fetch_id: u64, epoch: u64, result: &FetchResult) {
        let mut entries = self.entries.write().await;
        // After a clear the entry is gone, or belongs to a newer fetch
        let Some(entry) = entries
            .get_mut(key)
            .filter(|entry| entry.in_flight.as_ref().map(|f| f.id) == Some(fetch_id))
        else {
            tracing::debug!(?key, fetch_id, "Dropping result of a cleared entry");
            return;
        };

        entry.in_flight = None;
        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.last_error = None;
                entry.updated_at = Some(Utc::now());
                entry.freshness = if entry.epoch == epoch {
                    Freshness::Fresh
                } else {
                    tracing::debug!(?key, "Invalidated during fetch");
                    Freshness::Stale
                };
            }
            Err(err) => {
                tracing::warn!(?key, error = %err, "Fetch failed, keeping previous value");
                entry.freshness = Freshness::Stale;
                entry.last_error = Some(err.clone());
            }
        }
    }

    /// Last known value and freshness of an entry, without fetching.
    pub async fn peek(&self, key: &QueryKey) -> Option<CachedQuery> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| CachedQuery {
            value: entry.value.clone(),
            freshness: entry.freshness,
            last_error: entry.last_error.clone(),
            updated_at: entry.updated_at,
        })
    }

    pub async fn freshness(&self, key: &QueryKey) -> Option<Freshness> {
        self.entries.read().await.get(key).map(|e| e.freshness)
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            fetches_issued: self.counters.fetches.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry. In-flight fetches still deliver to their readers.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Mark every entry of a family stale without evicting its value.
    pub(crate) async fn mark_stale(&self, family: &QueryFamily) -> usize {
        let mut entries = self.entries.write().await;
        let mut marked = 0;
        for (_, entry) in entries.iter_mut().filter(|(key, _)| family.matches(key)) {
            entry.epoch += 1;
            if entry.freshness == Freshness::Fresh {
                entry.freshness = Freshness::Stale;
            }
            marked += 1;
        }
        marked
    }

    /// Apply `patch` to every cached value; returns how many it changed.
    ///
    /// A recipe-holding entry with a fetch in flight cannot be patched before
    /// the response lands, so its epoch is bumped and the fetch completes as
    /// Stale.
    pub(crate) async fn patch<F>(&self, mut patch: F) -> usize
    where
        F: FnMut(&QueryKey, &mut QueryValue) -> bool,
    {
        let mut entries = self.entries.write().await;
        let mut changed = 0;
        for (key, entry) in entries.iter_mut() {
            if entry.in_flight.is_some() && key.kind().holds_recipes() {
                entry.epoch += 1;
            }
            if let Some(value) = entry.value.as_mut() {
                if patch(key, value) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Replace an entry's value with data the service just returned.
    pub(crate) async fn set(&self, key: QueryKey, value: QueryValue) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_insert_with(CacheEntry::empty);
        entry.value = Some(value);
        entry.epoch += 1;
        entry.freshness = Freshness::Fresh;
        entry.last_error = None;
        entry.updated_at = Some(Utc::now());
    }
}

fn fresh_value(entry: &CacheEntry) -> Option<QueryValue> {
    match entry.freshness {
        Freshness::Fresh => entry.value.clone(),
        _ => None,
    }
}
