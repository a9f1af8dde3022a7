//! Bucketed snapshot cache in front of a [`CalendarProvider`].
//!
//! Every field computed within the same hour shares one snapshot. Misses on
//! the same bucket are coalesced: the first caller derives, the rest wait on
//! a per-bucket gate and then read what it stored.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use almanac_core::{BucketKey, Granularity, LunarSnapshot, SharedClock};
use chrono::{Duration, NaiveDateTime};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::{ProviderError, SharedProvider};

/// Eviction policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Entries expire after their TTL and are dropped on the next touch.
    /// Memory is bounded by the buckets used within one TTL window.
    #[default]
    Ttl,
    /// At most `capacity` entries, least recently used evicted first.
    /// TTL still applies.
    Lru,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub policy: CachePolicy,
    /// Lifetime of hour buckets.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Lifetime of day buckets.
    #[serde(default = "default_day_ttl")]
    pub day_ttl_seconds: u64,
}

fn default_ttl() -> u64 { 3600 }
fn default_capacity() -> usize { 24 }
fn default_day_ttl() -> u64 { 86400 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::default(),
            ttl_seconds: default_ttl(),
            capacity: default_capacity(),
            day_ttl_seconds: default_day_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, granularity: Granularity) -> Duration {
        let secs = match granularity {
            Granularity::Hour => self.ttl_seconds,
            Granularity::Day => self.day_ttl_seconds,
        };
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
    }
}

/// Counters exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub provider_calls: u64,
    pub entries: usize,
}

#[derive(Clone)]
struct CacheEntry {
    snapshot: Arc<LunarSnapshot>,
    inserted_at: NaiveDateTime,
}

enum Store {
    Ttl(HashMap<BucketKey, CacheEntry>),
    Lru(LruCache<BucketKey, CacheEntry>),
}

impl Store {
    fn get(&mut self, key: &BucketKey) -> Option<CacheEntry> {
        match self {
            Store::Ttl(map) => map.get(key).cloned(),
            Store::Lru(lru) => lru.get(key).cloned(),
        }
    }

    fn remove(&mut self, key: &BucketKey) {
        match self {
            Store::Ttl(map) => {
                map.remove(key);
            }
            Store::Lru(lru) => {
                lru.pop(key);
            }
        }
    }

    fn insert(&mut self, key: BucketKey, entry: CacheEntry) {
        match self {
            Store::Ttl(map) => {
                map.insert(key, entry);
            }
            Store::Lru(lru) => {
                if let Some((evicted, _)) = lru.push(key, entry) {
                    if evicted != key {
                        debug!(bucket = %evicted, "snapshot evicted");
                    }
                }
            }
        }
    }

    fn retain_fresh(&mut self, now: NaiveDateTime, config: &CacheConfig) {
        if let Store::Ttl(map) = self {
            map.retain(|key, e| now - e.inserted_at < config.ttl_for(key.granularity()));
        }
    }

    fn len(&self) -> usize {
        match self {
            Store::Ttl(map) => map.len(),
            Store::Lru(lru) => lru.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            Store::Ttl(map) => map.clear(),
            Store::Lru(lru) => lru.clear(),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Serializes derivations of one bucket.
#[derive(Default)]
struct Gate {
    lock: Arc<tokio::sync::Mutex<()>>,
    /// Callers holding or waiting on `lock`.
    holders: usize,
}

/// One caller's hold on a bucket's gate. The last holder to leave, by
/// return or cancellation, removes the gate.
struct GateHold<'a> {
    gates: &'a Mutex<HashMap<BucketKey, Gate>>,
    key: BucketKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> GateHold<'a> {
    fn enter(gates: &'a Mutex<HashMap<BucketKey, Gate>>, key: BucketKey) -> Self {
        let mut map = lock(gates);
        let gate = map.entry(key).or_default();
        gate.holders += 1;
        let lock = Arc::clone(&gate.lock);
        Self { gates, key, lock }
    }
}

impl Drop for GateHold<'_> {
    fn drop(&mut self) {
        let mut map = lock(self.gates);
        if let Some(gate) = map.get_mut(&self.key) {
            gate.holders = gate.holders.saturating_sub(1);
            if gate.holders == 0 {
                map.remove(&self.key);
            }
        }
    }
}

/// The only owner and writer of cached snapshots.
pub struct SnapshotCache {
    provider: SharedProvider,
    clock: SharedClock,
    config: CacheConfig,
    store: Mutex<Store>,
    gates: Mutex<HashMap<BucketKey, Gate>>,
    hits: AtomicU64,
    misses: AtomicU64,
    provider_calls: AtomicU64,
}

impl SnapshotCache {
    pub fn new(provider: SharedProvider, clock: SharedClock, config: CacheConfig) -> Self {
        let store = match config.policy {
            CachePolicy::Ttl => Store::Ttl(HashMap::new()),
            CachePolicy::Lru => {
                let cap = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
                Store::Lru(LruCache::new(cap))
            }
        };
        Self {
            provider,
            clock,
            config,
            store: Mutex::new(store),
            gates: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            provider_calls: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    /// Snapshot for the hour containing `instant`.
    pub async fn get(&self, instant: NaiveDateTime) -> Result<Arc<LunarSnapshot>, ProviderError> {
        self.get_bucket(BucketKey::hour(instant)).await
    }

    /// Snapshot for the day containing `instant`, derived at midnight.
    pub async fn get_day(&self, instant: NaiveDateTime) -> Result<Arc<LunarSnapshot>, ProviderError> {
        self.get_bucket(BucketKey::day(instant)).await
    }

    pub async fn get_bucket(&self, key: BucketKey) -> Result<Arc<LunarSnapshot>, ProviderError> {
        if let Some(hit) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        // Waiters derive in turn after a failure, behind the same gate.
        let hold = GateHold::enter(&self.gates, key);
        let _permit = hold.lock.lock().await;

        // Whoever held the gate before us may have filled the bucket.
        if let Some(hit) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.derive_and_store(key).await
    }

    async fn derive_and_store(&self, key: BucketKey) -> Result<Arc<LunarSnapshot>, ProviderError> {
        let result = self.derive(key).await;
        if let Ok(snapshot) = &result {
            let mut store = lock(&self.store);
            let now = self.clock.now();
            store.retain_fresh(now, &self.config);
            store.insert(
                key,
                CacheEntry {
                    snapshot: Arc::clone(snapshot),
                    inserted_at: now,
                },
            );
        }
        result
    }

    async fn derive(&self, key: BucketKey) -> Result<Arc<LunarSnapshot>, ProviderError> {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        let provider = Arc::clone(&self.provider);
        let start = key.start();
        let snapshot = tokio::task::spawn_blocking(move || provider.derive(start))
            .await
            .map_err(|e| ProviderError::Failed(format!("provider task aborted: {e}")))?;
        match snapshot {
            Ok(s) => {
                debug!(bucket = %key, provider = self.provider.name(), "snapshot derived");
                Ok(Arc::new(s))
            }
            Err(e) => {
                warn!(bucket = %key, error = %e, "snapshot derivation failed");
                Err(e)
            }
        }
    }

    /// A fresh entry, dropping it if expired.
    fn lookup(&self, key: &BucketKey) -> Option<Arc<LunarSnapshot>> {
        let mut store = lock(&self.store);
        let entry = store.get(key)?;
        if self.clock.now() - entry.inserted_at < self.config.ttl_for(key.granularity()) {
            Some(entry.snapshot)
        } else {
            store.remove(key);
            None
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            entries: lock(&self.store).len(),
        }
    }

    pub fn clear(&self) {
        lock(&self.store).clear();
    }
}
