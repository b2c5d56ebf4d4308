//! Caching layer
//!
//! Tiered cache for upstream results: a process-local memory tier over a
//! durable key/value store (Redis in production, in-process for tests and
//! Redis-less deployments).

pub mod store;
pub mod tiered;

pub use store::{DurableStore, MemoryStore, RedisStore, StoreError};
pub use tiered::{CacheLookup, TieredCache};
