//! Tiered Cache
//!
//! Two-level cache for expensive upstream results: a process-local map of
//! timestamped entries consulted first, falling through to a durable store
//! that outlives the process. Memory entries use a short TTL so repeated
//! requests inside one instance skip the network; durable entries use a much
//! longer TTL so a restarted instance warms itself without refetching.
//!
//! The durable tier is strictly best-effort. Every durable failure is logged
//! and degraded to a miss; callers never see a cache error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::cache::store::DurableStore;

/// Timestamped entry in the memory tier
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Value as stored, decoded per lookup
    value: Value,
    /// Entry is live while `now <= expires_at`
    expires_at: Instant,
}

/// Outcome of a tiered lookup
///
/// A durable-backend failure surfaces here as `Unavailable` instead of an
/// error: callers treat it like a miss, while tests and instrumentation can
/// still tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    /// Served from the memory tier
    Memory(T),
    /// Served from the durable tier; memory has been repopulated
    Durable(T),
    /// Neither tier holds a live value
    Miss,
    /// Memory missed and the durable backend failed
    Unavailable,
}

impl<T> CacheLookup<T> {
    /// Collapse to an Option, treating `Unavailable` as a miss
    pub fn value(self) -> Option<T> {
        match self {
            CacheLookup::Memory(v) | CacheLookup::Durable(v) => Some(v),
            CacheLookup::Miss | CacheLookup::Unavailable => None,
        }
    }

    /// Whether either tier served a value
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Memory(_) | CacheLookup::Durable(_))
    }
}

/// Memory-first cache over a durable key/value store
///
/// Values cross this API as serde types and live in both tiers as JSON.
/// Expiry is checked lazily on access; there is no background sweep.
pub struct TieredCache {
    /// Memory tier; lock is never held across an await
    entries: Mutex<HashMap<String, CacheEntry>>,
    /// Durable tier
    store: Arc<dyn DurableStore>,
    /// Memory-tier TTL unless a set overrides it
    default_ttl: Duration,
    /// TTL handed to the durable store on every mirror write
    durable_ttl: Duration,
    /// Lookup counters across both tiers
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TieredCache {
    /// Create a cache over `store`
    ///
    /// # Arguments
    /// * `default_ttl` - memory-tier TTL applied when a set does not specify one
    /// * `durable_ttl` - TTL for durable mirrors, conventionally much longer
    pub fn new(store: Arc<dyn DurableStore>, default_ttl: Duration, durable_ttl: Duration) -> Self {
        debug!(
            store = store.name(),
            default_ttl_s = default_ttl.as_secs(),
            durable_ttl_s = durable_ttl.as_secs(),
            "Tiered cache initialized"
        );

        Self {
            entries: Mutex::new(HashMap::new()),
            store,
            default_ttl,
            durable_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Store a value in both tiers under the default memory TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_ttl(key, value, self.default_ttl).await;
    }

    /// Store a value in both tiers with an explicit memory TTL
    ///
    /// The durable mirror always uses the configured durable TTL, not `ttl`.
    /// A failed durable write is logged and swallowed; the memory entry
    /// stands either way.
    pub async fn set_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(json) = encode(key, value) else {
            return;
        };

        self.insert_memory(key, json.clone(), ttl);

        if let Err(e) = self.store.set(key, &json, self.durable_ttl.as_secs()).await {
            warn!(
                key = key,
                store = self.store.name(),
                error = %e,
                "Durable cache write failed, memory entry only"
            );
        }
    }

    /// Store a value in the memory tier only
    pub fn set_local<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Some(json) = encode(key, value) {
            self.insert_memory(key, json, ttl);
        }
    }

    /// Look up `key`, memory tier first
    ///
    /// On a memory miss the durable tier is consulted; a durable hit
    /// repopulates memory under the default TTL (not the remainder of the
    /// original one). Expired memory entries are discarded here, lazily.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        let memory_value = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(key) {
                Some(entry) if Instant::now() <= entry.expires_at => Some(entry.value.clone()),
                Some(_) => {
                    entries.remove(key);
                    None
                }
                None => None,
            }
        };

        if let Some(json) = memory_value {
            match serde_json::from_value(json) {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(key = key, tier = "memory", "Cache HIT");
                    return CacheLookup::Memory(value);
                }
                Err(e) => {
                    // Wrong shape for the requested type; drop it and let the
                    // durable tier answer
                    warn!(key = key, error = %e, "Memory cache entry failed to decode, discarding");
                    self.entries.lock().unwrap().remove(key);
                }
            }
        }

        match self.store.get(key).await {
            Ok(Some(json)) => match serde_json::from_value::<T>(json.clone()) {
                Ok(value) => {
                    self.insert_memory(key, json, self.default_ttl);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(key = key, tier = "durable", "Cache HIT, memory repopulated");
                    CacheLookup::Durable(value)
                }
                Err(e) => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        key = key,
                        store = self.store.name(),
                        error = %e,
                        "Durable cache value failed to decode, treating as miss"
                    );
                    CacheLookup::Miss
                }
            },
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key = key, "Cache MISS");
                CacheLookup::Miss
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = key,
                    store = self.store.name(),
                    error = %e,
                    "Durable cache read failed, treating as miss"
                );
                CacheLookup::Unavailable
            }
        }
    }

    /// Remove `key` from memory and, best-effort, from the durable store
    pub async fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);

        if let Err(e) = self.store.delete(key).await {
            warn!(
                key = key,
                store = self.store.name(),
                error = %e,
                "Durable cache delete failed"
            );
        }

        debug!(key = key, "Cache entry deleted");
    }

    /// Empty the memory tier
    ///
    /// The durable store offers no bulk delete, so its entries are left to
    /// age out under their own TTL.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        let count = entries.len();
        entries.clear();
        debug!(entries = count, "Memory cache tier cleared");
    }

    /// Lookup counters: (hits, misses, hit rate percent)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    fn insert_memory(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

/// Serialize a value for caching, or log and skip on failure
///
/// Serialization failure means the set silently becomes a later miss, which
/// is the contract: the cache never fails its caller.
fn encode<T: Serialize>(key: &str, value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(key = key, error = %e, "Value not cacheable, skipping");
            None
        }
    }
}
