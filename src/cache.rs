//! Time-bounded, single-flight cache of provider results keyed by SSID.
//!
//! Each SSID owns a slot in a map behind a short `std::sync::Mutex`. A lookup
//! that finds the slot missing or stale spawns a detached fetch task and
//! parks a shared handle to its outcome in the slot, so concurrent callers
//! for the same SSID await that one fetch (failures included), and a caller
//! that goes away does not cancel it. Writes to disk run on the blocking pool.
//!
//! Persisted on disk as:
//! ```json
//! {
//!   "scope": "bbox:49.8:59.5:-8.7:1.9",
//!   "entries": {
//!     "HomeNet-42": {
//!       "ssid": "HomeNet-42",
//!       "points": [{ "latitude": 51.5, "longitude": -0.1 }],
//!       "fetched_at": "2026-01-01T12:00:00Z",
//!       "ttl_ms": 86400000
//!     }
//!   }
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::geo::GeoPoint;

/// One fetched point set with the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub ssid: String,
    pub points: Vec<GeoPoint>,
    pub fetched_at: DateTime<Utc>,
    pub ttl_ms: i64,
}

impl CacheEntry {
    pub fn new(ssid: String, points: Vec<GeoPoint>, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            ssid,
            points,
            fetched_at,
            ttl_ms: ttl.num_milliseconds(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::milliseconds(self.ttl_ms)
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < self.ttl()
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedCache<E> {
    scope: String,
    entries: BTreeMap<String, E>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Vec<GeoPoint>, Arc<ProviderError>>>>;

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    // set while a fetch runs; cleared by the fetch task when it settles
    inflight: Option<SharedFetch>,
}

/// Entries to write, numbered in the order they were taken.
struct Snapshot {
    generation: u64,
    entries: BTreeMap<String, CacheEntry>,
}

struct Inner {
    scope: String,
    path: Option<PathBuf>,
    slots: Mutex<HashMap<String, Slot>>,
    // bumped under the slots lock so snapshots order like the changes they capture
    generation: AtomicU64,
    // generation last written to disk
    on_disk: Mutex<u64>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    /// Takes a snapshot of every entry. Call with the slots lock held.
    fn snapshot(&self, slots: &HashMap<String, Slot>) -> Option<Snapshot> {
        self.path.as_ref()?;
        let generation = self.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let entries = slots
            .iter()
            .filter_map(|(ssid, slot)| slot.entry.clone().map(|e| (ssid.clone(), e)))
            .collect();
        Some(Snapshot { generation, entries })
    }

    /// Stores the outcome of a fetch and retires the in-flight marker.
    async fn settle(self: &Arc<Self>, ssid: &str, result: &Result<Vec<GeoPoint>, Arc<ProviderError>>, ttl: Duration) {
        let snapshot = {
            let mut slots = lock(&self.slots);
            let slot = slots.entry(ssid.to_string()).or_default();
            slot.inflight = None;
            match result {
                Ok(points) => {
                    slot.entry = Some(CacheEntry::new(ssid.to_string(), points.clone(), Utc::now(), ttl));
                    self.snapshot(&slots)
                }
                Err(_) => None,
            }
        };
        if let Some(snapshot) = snapshot {
            self.persist(snapshot).await;
        }
    }

    async fn persist(self: &Arc<Self>, snapshot: Snapshot) {
        let inner = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || inner.write(snapshot)).await {
            warn!(error = %e, "Cache write task failed");
        }
    }

    fn write(&self, snapshot: Snapshot) {
        let Some(path) = &self.path else {
            return;
        };
        let mut on_disk = lock(&self.on_disk);
        if *on_disk >= snapshot.generation {
            // a newer snapshot already landed
            return;
        }
        let doc = PersistedCache {
            scope: self.scope.clone(),
            entries: snapshot.entries,
        };
        let result = serde_json::to_string(&doc)
            .map_err(std::io::Error::from)
            .and_then(|json| std::fs::write(path, json));
        match result {
            Ok(()) => *on_disk = snapshot.generation,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to persist cache"),
        }
    }
}

/// Waiters see an `Arc`'d error; hand back the plain one when nobody else holds it.
fn unshare(err: Arc<ProviderError>) -> ProviderError {
    Arc::try_unwrap(err).unwrap_or_else(ProviderError::Shared)
}

/// Shared handle to the result cache. Cloning is cheap.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Inner>,
}

impl ResultCache {
    /// A cache that lives only as long as the process.
    pub fn in_memory(scope: impl Into<String>) -> Self {
        Self::with_entries(scope.into(), None, BTreeMap::new())
    }

    /// A cache backed by `path`. Entries from a different scope, corrupt
    /// entries and unreadable files all start out as misses.
    pub fn open(path: impl AsRef<Path>, scope: impl Into<String>) -> Self {
        let path = path.as_ref().to_path_buf();
        let scope = scope.into();
        let entries = load_entries(&path, &scope);
        info!(path = %path.display(), scope = %scope, entries = entries.len(), "Cache opened");
        Self::with_entries(scope, Some(path), entries)
    }

    fn with_entries(scope: String, path: Option<PathBuf>, entries: BTreeMap<String, CacheEntry>) -> Self {
        let slots = entries
            .into_iter()
            .map(|(ssid, entry)| {
                let slot = Slot {
                    entry: Some(entry),
                    inflight: None,
                };
                (ssid, slot)
            })
            .collect();
        Self {
            inner: Arc::new(Inner {
                scope,
                path,
                slots: Mutex::new(slots),
                generation: AtomicU64::new(0),
                on_disk: Mutex::new(0),
            }),
        }
    }

    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    /// Returns the cached points for `ssid` when fresh, otherwise fetches,
    /// stores and returns them. Callers arriving while a fetch for `ssid` is
    /// running wait for that fetch and get its outcome, success or failure.
    /// A failed fetch stores nothing and a stale entry is never returned in
    /// its place.
    pub async fn get_or_fetch<F, Fut>(&self, ssid: &str, fetch: F, ttl: Duration) -> Result<Vec<GeoPoint>, ProviderError>
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<GeoPoint>, ProviderError>> + Send + 'static,
    {
        let pending = {
            let mut slots = lock(&self.inner.slots);
            let slot = slots.entry(ssid.to_string()).or_default();

            if let Some(entry) = &slot.entry {
                if entry.is_fresh_at(Utc::now()) {
                    debug!(ssid, points = entry.points.len(), "Cache hit");
                    return Ok(entry.points.clone());
                }
                debug!(ssid, fetched_at = %entry.fetched_at, "Cache entry stale");
            }

            match slot.inflight.clone() {
                Some(pending) => {
                    debug!(ssid, "Joining in-flight fetch");
                    pending
                }
                None => {
                    let pending = self.start_fetch(ssid, fetch, ttl);
                    slot.inflight = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await.map_err(unshare)
    }

    /// Spawns the fetch on its own task so it outlives any caller. The task
    /// settles the slot before its result is observed.
    fn start_fetch<F, Fut>(&self, ssid: &str, fetch: F, ttl: Duration) -> SharedFetch
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<GeoPoint>, ProviderError>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let key = ssid.to_string();
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(async { fetch(key.clone()).await })
                .catch_unwind()
                .await
            {
                Ok(result) => result.map_err(Arc::new),
                Err(_) => Err(Arc::new(ProviderError::Aborted(format!("fetch for '{key}' panicked")))),
            };
            inner.settle(&key, &result, ttl).await;
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(Arc::new(ProviderError::Aborted(e.to_string()))))
        }
        .boxed()
        .shared()
    }

    /// Drops any entry for `ssid`, waiting for an in-flight fetch to finish first.
    pub async fn invalidate(&self, ssid: &str) {
        let pending = lock(&self.inner.slots)
            .get(ssid)
            .and_then(|slot| slot.inflight.clone());
        if let Some(pending) = pending {
            let _ = pending.await;
        }

        let snapshot = {
            let mut slots = lock(&self.inner.slots);
            match slots.get_mut(ssid) {
                Some(slot) if slot.entry.is_some() => {
                    slot.entry = None;
                    self.inner.snapshot(&slots)
                }
                _ => None,
            }
        };
        if let Some(snapshot) = snapshot {
            self.inner.persist(snapshot).await;
        }
        debug!(ssid, "Cache entry invalidated");
    }

    /// Current entry for `ssid`, fresh or not.
    pub async fn entry(&self, ssid: &str) -> Option<CacheEntry> {
        lock(&self.inner.slots).get(ssid)?.entry.clone()
    }
}

fn load_entries(path: &Path, scope: &str) -> BTreeMap<String, CacheEntry> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cache file unreadable, starting empty");
            return BTreeMap::new();
        }
    };

    let doc: PersistedCache<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cache file corrupt, starting empty");
            return BTreeMap::new();
        }
    };

    if doc.scope != scope {
        info!(stored = %doc.scope, configured = %scope, "Cache scope changed, discarding entries");
        return BTreeMap::new();
    }

    doc.entries
        .into_iter()
        .filter_map(|(ssid, raw)| match serde_json::from_value::<CacheEntry>(raw) {
            Ok(entry) if entry.ssid == ssid => Some((ssid, entry)),
            Ok(entry) => {
                warn!(key = %ssid, ssid = %entry.ssid, "Cache entry keyed under wrong SSID, dropping");
                None
            }
            Err(e) => {
                warn!(ssid = %ssid, error = %e, "Corrupt cache entry, treating as miss");
                None
            }
        })
        .collect()
}
