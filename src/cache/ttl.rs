//! Time-to-live cache for data fetched through the manager.
//!
//! Entries expire `ttl` after insertion and are evicted lazily when read.
//! `purge_expired` sweeps everything at once.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A thread-safe TTL map. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<DashMap<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, inserted_at: Instant, now: Instant) -> bool {
        inserted_at + self.ttl < now
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, (value, Instant::now()));
    }

    /// Fresh value for `key`, evicting it if it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.inner.get(key) {
            Some(entry) if !self.is_expired(entry.1, now) => return Some(entry.0.clone()),
            Some(_) => {}
            None => return None,
        }
        self.inner
            .remove_if(key, |_, (_, inserted_at)| self.is_expired(*inserted_at, now));
        None
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, (value, _))| value)
    }

    /// Cached value, or the result of `fetch` which is cached on success.
    ///
    /// Concurrent misses may each run `fetch`; the last one wins.
    pub async fn get_or_try_insert_with<E, F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner
            .retain(|_, (_, inserted_at)| !self.is_expired(*inserted_at, now));
        before - self.inner.len()
    }

    /// Entries currently stored, including not-yet-evicted expired ones.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
