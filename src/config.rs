//! Environment-driven configuration
//!
//! Everything is resolved once at startup and injected by value; nothing in
//! the library reads the environment on its own. Only `ALIST_BASE_URL` is
//! required, every other variable has a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Upstream connection and login settings
#[derive(Debug, Clone)]
pub struct AlistConfig {
    /// Base URL of the Alist server
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Consecutive login failures tolerated before failing fast
    pub max_login_attempts: u32,
}

/// Cache backend selection and TTL policy
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Durable-tier Redis URL; unset selects the in-process store
    pub redis_url: Option<String>,
    /// Default memory-tier TTL
    pub memory_ttl: Duration,
    /// Durable-tier TTL, conventionally much longer than the memory TTL
    pub durable_ttl: Duration,
    /// Memory-tier TTL for directory listings
    pub listing_ttl: Duration,
}

/// Album catalog settings
#[derive(Debug, Clone)]
pub struct AlbumsConfig {
    /// Catalog root on the file host
    pub base_path: String,
    /// Memory TTL for assembled catalog pages
    pub page_ttl: Duration,
    /// Default catalog page size
    pub page_size: usize,
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub alist: AlistConfig,
    pub cache: CacheConfig,
    pub albums: AlbumsConfig,
}

impl Config {
    /// Resolve configuration from the environment
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("ALIST_BASE_URL")
            .context("ALIST_BASE_URL is not set (e.g. https://alist.example.com)")?;

        Ok(Self {
            alist: AlistConfig {
                base_url,
                username: var_or("ALIST_USERNAME", "guest"),
                password: var_or("ALIST_PASSWORD", "guest"),
                max_login_attempts: parse_var("ALIST_MAX_LOGIN_ATTEMPTS", 3)?,
            },
            cache: CacheConfig {
                redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
                memory_ttl: Duration::from_secs(parse_var("CACHE_MEMORY_TTL_SECS", 7200)?),
                durable_ttl: Duration::from_secs(parse_var("CACHE_DURABLE_TTL_SECS", 43_200)?),
                listing_ttl: Duration::from_secs(parse_var("CACHE_LISTING_TTL_SECS", 60)?),
            },
            albums: AlbumsConfig {
                base_path: var_or("ALBUMS_BASE_PATH", "/"),
                page_ttl: Duration::from_secs(parse_var("ALBUMS_PAGE_TTL_SECS", 60)?),
                page_size: parse_var("ALBUMS_PAGE_SIZE", 10)?,
            },
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Parse a numeric variable, falling back to `default` when unset
///
/// A set-but-unparsable value is a startup error, not a silent fallback.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
