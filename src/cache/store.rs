//! Durable Cache Backends
//!
//! Persistent key/value tier behind the in-memory cache. Values are stored
//! as JSON under a string key with a backend-managed TTL, so a fresh process
//! can warm itself from whatever the previous one left behind.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, info};

/// Errors from the durable tier
///
/// These never reach cache callers directly: the tiered cache logs them and
/// degrades to a miss. They are still distinct variants so the log line says
/// whether the backend was unreachable or rejected the command.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backend connection failed: {0}")]
    Connection(String),

    #[error("Backend command failed: {0}")]
    Command(String),

    #[error("Value serialization failed: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Persistent key/value backend with per-write TTL
///
/// Implementations must tolerate concurrent calls; the tiered cache shares
/// one instance across all request handlers.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store a JSON value under `key`, expiring after `ttl_seconds`
    async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<(), StoreError>;

    /// Fetch the live value for `key`, or None if absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Remove `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Backend name for log lines
    fn name(&self) -> &'static str;
}

/// Redis-backed durable store
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Connect to Redis and verify the server answers a PING
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::from)?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::from)?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from)?;

        info!(url = %url, "Durable cache store connected");

        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, payload, ttl_seconds).await?;

        debug!(key = key, ttl_s = ttl_seconds, "Durable store SET");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(key).await?;

        match raw {
            Some(payload) => {
                let value = serde_json::from_str(&payload)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// A durable record held in process memory
#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    expires_at: Instant,
}

/// In-process durable store
///
/// Stand-in for deployments without a Redis URL, and the backend the tests
/// run against. "Durable" only relative to the memory tier: entries honor
/// their TTL and survive `TieredCache::clear`, not a process restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.clone(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(stored) if Instant::now() <= stored.expires_at => Ok(Some(stored.value.clone())),
            Some(_) => {
                // Expired entries are dropped on access, no sweeper
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
