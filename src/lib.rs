//! Alist Gallery - tiered-cache backend for a photo-album gallery
//!
//! A process-local cache tier over a durable Redis-style store, fronting an
//! authenticated, session-renewing client for an Alist file host, with the
//! album catalog assembled on top of the two.

pub mod alist;
pub mod cache;
pub mod config;
pub mod gallery;

pub use alist::{AlistClient, AlistError, HttpAlistApi};
pub use cache::{CacheLookup, DurableStore, MemoryStore, RedisStore, StoreError, TieredCache};
pub use config::Config;
pub use gallery::{Album, AlbumPage, Gallery, Pagination};
