//! Cache Store Module
//!
//! TTL cache that collapses concurrent fetches of one key into a single
//! upstream call and serves stale values while refreshing them.
//!
//! Two maps are kept apart: stored entries, and fetches currently in flight.
//! That split lets `get` hand out an expired value at once while its refresh
//! is running, and lets every caller asking for an absent key join the same
//! pending fetch.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheEntry, CacheEvent, CacheStats, DEFAULT_EXPIRY};
use crate::error::Error;
use crate::events::Notifier;

/// Outcome of a fetch: the fallback's own result, or the reason it never
/// produced one.
pub type FetchOutcome<V, E> = Result<Result<Option<V>, E>, Error>;

/// Pending fetch shared by every caller that joined it.
pub type Fetch<V, E> = Shared<BoxFuture<'static, FetchOutcome<V, E>>>;

// == Cache Config ==
/// Settings applied to values stored without an explicit expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Validity window of a freshly stored value
    pub expiry: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry: DEFAULT_EXPIRY,
        }
    }
}

struct Inner<K, V, E> {
    config: CacheConfig,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<K, Fetch<V, E>>>,
    stats: Mutex<CacheStats>,
    events: Notifier<CacheEvent<K, V>>,
}

/// Deregisters an in-flight fetch when its task settles, whatever the outcome.
struct InFlightGuard<K: Eq + Hash, V, E> {
    inner: Arc<Inner<K, V, E>>,
    id: K,
}

impl<K: Eq + Hash, V, E> Drop for InFlightGuard<K, V, E> {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.id);
    }
}

// == Map Cache ==
/// Deduplicating TTL cache.
///
/// `K` is the key, `V` the cached value and `E` the error a fallback may
/// fail with. Clones share the same storage.
pub struct MapCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> MapCache<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache with the default expiry.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with the given settings.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                stats: Mutex::new(CacheStats::new()),
                events: Notifier::new(),
            }),
        }
    }

    /// Returns the settings this cache was created with.
    pub fn config(&self) -> CacheConfig {
        self.inner.config
    }

    /// Set/delete notifications.
    pub fn events(&self) -> &Notifier<CacheEvent<K, V>> {
        &self.inner.events
    }

    // == Fetch ==
    /// Fetches `id` through `fallback`, joining the in-flight fetch for `id`
    /// if there is one.
    ///
    /// A new fetch invokes `fallback` exactly once and spawns the returned
    /// future. When it resolves to `Ok(Some(v))`, `v` is stored with a fresh
    /// expiry before any joined caller sees the result; `Ok(None)` and `Err`
    /// leave the cache untouched. The in-flight registration is dropped when
    /// the fetch settles, successful or not.
    ///
    /// `fallback` is invoked while the in-flight map is locked, so it must
    /// not call back into this cache before returning its future.
    ///
    /// # Panics
    /// Panics when a new fetch is started outside a Tokio runtime.
    pub fn fetch<F, Fut>(&self, id: K, fallback: F) -> Fetch<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    {
        // Resolved before locking: spawning outside a runtime drops the task,
        // and with it the in-flight guard, which needs the lock.
        let runtime = Handle::try_current();
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(pending) = in_flight.get(&id) {
            self.inner.stats.lock().record_joined_fetch();
            debug!("Joining in-flight fetch for {:?}", id);
            return pending.clone();
        }
        let runtime = match runtime {
            Ok(runtime) => runtime,
            Err(err) => {
                drop(in_flight);
                panic!("fetch for {:?} started outside a Tokio runtime: {}", id, err);
            }
        };

        let upstream = fallback();
        self.inner.stats.lock().record_fetch();
        debug!("Starting fetch for {:?}", id);

        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            id: id.clone(),
        };
        let cache = self.clone();
        let key = id.clone();
        let task = runtime.spawn(async move {
            let _in_flight = guard;
            let result = upstream.await;
            match &result {
                Ok(Some(value)) => cache.set(key, value.clone(), None),
                Ok(None) => debug!("Fetch for {:?} returned no data", key),
                Err(_) => debug!("Fetch for {:?} failed", key),
            }
            result
        });

        let pending: Fetch<V, E> = task
            .map(|joined| joined.map_err(Error::from))
            .boxed()
            .shared();
        in_flight.insert(id, pending.clone());
        pending
    }

    // == Get ==
    /// Returns the stored value for `id`, fetching it when absent.
    ///
    /// An expired entry is still returned immediately; a refresh is started
    /// in the background and its outcome, including failure, is not reported
    /// to this caller.
    pub fn get<F, Fut>(&self, id: K, fallback: F) -> BoxFuture<'static, FetchOutcome<V, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    {
        self.get_with_staleness(id, fallback).0
    }

    /// [`MapCache::get`], also reporting whether the value about to be served
    /// had expired. Both come from the same read of the entry.
    pub fn get_with_staleness<F, Fut>(
        &self,
        id: K,
        fallback: F,
    ) -> (BoxFuture<'static, FetchOutcome<V, E>>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    {
        let now = current_timestamp_ms();
        let cached = self
            .inner
            .entries
            .lock()
            .get(&id)
            .map(|entry| (entry.value.clone(), entry.is_expired_at(now)));

        match cached {
            Some((value, stale)) => {
                self.inner.stats.lock().record_hit(stale);
                if stale {
                    debug!("Serving stale {:?} while refreshing", id);
                    let _refresh = self.fetch(id, fallback);
                }
                (future::ready(Ok(Ok(Some(value)))).boxed(), stale)
            }
            None => {
                self.inner.stats.lock().record_miss();
                (self.fetch(id, fallback).boxed(), false)
            }
        }
    }

    // == Get Immediate ==
    /// Returns the stored value for `id` without fetching or checking expiry.
    pub fn get_immediate(&self, id: &K) -> Option<V> {
        self.inner
            .entries
            .lock()
            .get(id)
            .map(|entry| entry.value.clone())
    }

    // == Set ==
    /// Stores `data` for `id`, replacing any existing entry.
    ///
    /// `expire_at` defaults to now plus the configured expiry.
    pub fn set(&self, id: K, data: V, expire_at: Option<u64>) {
        let expire_at = expire_at.unwrap_or_else(|| {
            let expiry_ms = self.inner.config.expiry.as_millis() as u64;
            current_timestamp_ms().saturating_add(expiry_ms)
        });

        self.inner
            .entries
            .lock()
            .insert(id.clone(), CacheEntry::new(data.clone(), expire_at));
        debug!("Stored {:?} until {}", id, expire_at);

        self.inner.events.emit(&CacheEvent::Set {
            id,
            data,
            expire_at,
        });
    }

    // == Expiry ==
    /// Returns whether `id` is stored and expired. Absent keys are not expired.
    pub fn is_expired(&self, id: &K) -> bool {
        self.is_expired_at(id, current_timestamp_ms())
    }

    /// [`MapCache::is_expired`] evaluated at `now`.
    pub fn is_expired_at(&self, id: &K, now: u64) -> bool {
        self.inner
            .entries
            .lock()
            .get(id)
            .is_some_and(|entry| entry.is_expired_at(now))
    }

    // == Remove ==
    /// Removes `id` and emits a delete event, whether or not it was stored.
    pub fn remove(&self, id: &K) {
        self.inner.entries.lock().remove(id);
        debug!("Removed {:?}", id);
        self.inner
            .events
            .emit(&CacheEvent::Delete { id: id.clone() });
    }

    /// Removes `id` only if it is expired. Returns whether it was removed.
    pub fn remove_expired(&self, id: &K) -> bool {
        self.remove_expired_at(id, current_timestamp_ms())
    }

    /// [`MapCache::remove_expired`] evaluated at `now`.
    pub fn remove_expired_at(&self, id: &K, now: u64) -> bool {
        let removed = {
            let mut entries = self.inner.entries.lock();
            let expired = entries
                .get(id)
                .is_some_and(|entry| entry.is_expired_at(now));
            expired && entries.remove(id).is_some()
        };

        if removed {
            debug!("Removed expired {:?}", id);
            self.inner
                .events
                .emit(&CacheEvent::Delete { id: id.clone() });
        }
        removed
    }

    // == Clean ==
    /// Removes every expired entry, judged against a single timestamp taken
    /// at the start of the sweep. Returns the number of entries removed.
    pub fn clean(&self) -> usize {
        let now = current_timestamp_ms();
        let keys: Vec<K> = self.inner.entries.lock().keys().cloned().collect();

        let removed = keys
            .iter()
            .filter(|id| self.remove_expired_at(id, now))
            .count();

        debug!("Sweep removed {} expired entries", removed);
        removed
    }

    // == Introspection ==
    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Returns whether a fetch for `id` is in flight.
    pub fn is_fetching(&self, id: &K) -> bool {
        self.inner.in_flight.lock().contains_key(id)
    }

    /// Returns the number of fetches in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.total_entries = self.len();
        stats.in_flight = self.in_flight_count();
        stats
    }

    // == Raw Access ==
    /// Runs `f` with direct mutable access to the stored entries.
    ///
    /// Nothing done here emits events or touches statistics, and the entries
    /// map stays locked for the duration of `f`: calling back into this cache
    /// from `f` deadlocks.
    pub fn with_raw_entries<R>(&self, f: impl FnOnce(&mut HashMap<K, CacheEntry<V>>) -> R) -> R {
        let mut entries = self.inner.entries.lock();
        f(&mut *entries)
    }
}

impl<K, V, E> Default for MapCache<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> Clone for MapCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> fmt::Debug for MapCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapCache")
            .field("config", &self.inner.config)
            .field("entries", &self.inner.entries.lock().len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish()
    }
}
