//! Alist API Client
//!
//! Authenticated access to a remote Alist server. The client renews its
//! session transparently (one relogin-and-retry when an operation comes back
//! with a 401 envelope), coalesces concurrent identical listing requests
//! into a single upstream fetch, and writes listings through the tiered
//! cache. Reads, uploads and deletes of individual files are never cached.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::alist::api::AlistApi;
use crate::alist::errors::AlistError;
use crate::alist::types::{DirListing, FileInfo};
use crate::cache::TieredCache;

/// Session state shared by all clones of the client
struct Session {
    /// Current token; None before the first login and after a rejection
    token: Option<String>,
    /// Consecutive failed logins
    login_attempts: u32,
}

/// Pending listing fetch shared by coalesced callers
type InFlightListing = Shared<BoxFuture<'static, Result<DirListing, AlistError>>>;

/// Clears a pending fetch's map entry when dropped
///
/// Held inside the shared fetch future, so the entry is removed however the
/// future settles, a panic mid-fetch included.
struct InFlightSlot {
    inflight: Arc<Mutex<HashMap<String, InFlightListing>>>,
    key: String,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inflight.remove(&self.key);
    }
}

/// Cache key for a directory listing
fn listing_key(path: &str) -> String {
    format!("files_{}", path)
}

/// Parent directory of an Alist path ("/a/b/c.jpg" yields "/a/b")
fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

/// Login-endpoint rejections surface as Auth; transport failures stay as is
fn as_auth_error(err: AlistError) -> AlistError {
    match err {
        AlistError::Upstream(_, message) => AlistError::Auth(message),
        AlistError::Unauthorized => AlistError::Auth("credentials rejected".to_string()),
        other => other,
    }
}

/// Authenticated Alist client with listing cache and request coalescing
#[derive(Clone)]
pub struct AlistClient {
    /// Wire transport
    api: Arc<dyn AlistApi>,
    /// Tiered cache holding directory listings
    cache: Arc<TieredCache>,
    /// Session token and attempt counter; the async mutex is held across
    /// login calls so concurrent renewals collapse into one
    session: Arc<AsyncMutex<Session>>,
    /// At most one pending fetch per listing key
    inflight: Arc<Mutex<HashMap<String, InFlightListing>>>,
    /// Login credentials
    username: String,
    password: String,
    /// Consecutive login failures tolerated before failing fast
    max_login_attempts: u32,
    /// Memory-tier TTL for cached listings
    listing_ttl: Duration,
}

impl AlistClient {
    /// Create a client over `api`, caching listings in `cache`
    ///
    /// # Arguments
    /// * `max_login_attempts` - consecutive-failure ceiling for logins
    /// * `listing_ttl` - memory-tier TTL for directory listings
    pub fn new(
        api: Arc<dyn AlistApi>,
        cache: Arc<TieredCache>,
        username: impl Into<String>,
        password: impl Into<String>,
        max_login_attempts: u32,
        listing_ttl: Duration,
    ) -> Self {
        let username = username.into();
        debug!(user = %username, "Alist client created");

        Self {
            api,
            cache,
            session: Arc::new(AsyncMutex::new(Session {
                token: None,
                login_attempts: 0,
            })),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            username,
            password: password.into(),
            max_login_attempts,
            listing_ttl,
        }
    }

    /// Ensure the session is usable, logging in if needed
    ///
    /// A held token is probed against `/api/me` first; if the probe passes
    /// this is a no-op. Any probe failure discards the token and falls back
    /// to a fresh credential exchange.
    pub async fn login(&self) -> Result<(), AlistError> {
        let mut session = self.session.lock().await;

        if let Some(token) = session.token.clone() {
            match self.api.me(&token).await {
                Ok(()) => {
                    debug!("Session token still valid");
                    return Ok(());
                }
                Err(e) => {
                    debug!(error = %e, "Session token rejected by probe, renewing");
                    session.token = None;
                }
            }
        }

        self.login_locked(&mut session).await.map(|_| ())
    }

    /// List a directory, serving from cache and coalescing concurrent fetches
    ///
    /// Concurrent callers for the same uncached path share one upstream
    /// fetch and receive the identical listing or error.
    pub async fn list_directory(&self, path: &str) -> Result<DirListing, AlistError> {
        let key = listing_key(path);

        if let Some(listing) = self.cache.get::<DirListing>(&key).await.value() {
            debug!(path = path, "Listing served from cache");
            return Ok(listing);
        }

        let fetch = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.entry(key) {
                Entry::Occupied(pending) => {
                    debug!(path = path, "Joining in-flight listing fetch");
                    pending.get().clone()
                }
                Entry::Vacant(slot) => {
                    let client = self.clone();
                    let key_owned = slot.key().clone();
                    let path_owned = path.to_string();
                    let pending = async move {
                        client.fetch_listing(&key_owned, &path_owned).await
                    }
                    .boxed()
                    .shared();
                    slot.insert(pending.clone());
                    pending
                }
            }
        };

        fetch.await
    }

    /// Fetch one file's detail, including its download URL
    pub async fn read_file(&self, path: &str) -> Result<FileInfo, AlistError> {
        debug!(path = path, "Fetching file detail");

        let path_owned = path.to_string();
        self.with_auth_retry("fs_get", move |api, token| {
            let path = path_owned.clone();
            async move { api.file_info(&token, &path).await }
        })
        .await
    }

    /// Upload a file into the directory at `path`
    pub async fn upload_file(
        &self,
        path: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<(), AlistError> {
        info!(
            path = path,
            file = file_name,
            bytes = content.len(),
            "Uploading file"
        );

        let path_owned = path.to_string();
        let name_owned = file_name.to_string();
        self.with_auth_retry("fs_upload", move |api, token| {
            let path = path_owned.clone();
            let name = name_owned.clone();
            let content = content.clone();
            async move { api.upload(&token, &path, &name, content).await }
        })
        .await
    }

    /// Delete the remote file at `path`
    ///
    /// Also drops the parent directory's cached listing, which would
    /// otherwise keep serving the deleted entry until it expired.
    pub async fn delete_file(&self, path: &str) -> Result<(), AlistError> {
        info!(path = path, "Deleting remote file");

        let path_owned = path.to_string();
        self.with_auth_retry("fs_delete", move |api, token| {
            let path = path_owned.clone();
            async move { api.delete(&token, &path).await }
        })
        .await?;

        self.cache.delete(&listing_key(parent_path(path))).await;
        Ok(())
    }

    /// Upstream fetch behind a coalesced listing request
    ///
    /// Runs once per in-flight entry. A guard removes the entry when this
    /// future settles, even by panic. The guard drops after the cache write,
    /// so late callers either hit the cache or start a fresh fetch.
    async fn fetch_listing(&self, key: &str, path: &str) -> Result<DirListing, AlistError> {
        let _slot = InFlightSlot {
            inflight: Arc::clone(&self.inflight),
            key: key.to_string(),
        };

        debug!(path = path, "Fetching directory listing upstream");

        let path_owned = path.to_string();
        let result = self
            .with_auth_retry("fs_list", move |api, token| {
                let path = path_owned.clone();
                async move { api.list(&token, &path).await }
            })
            .await;

        if let Ok(listing) = &result {
            debug!(
                path = path,
                entries = listing.content.len(),
                "Listing fetched"
            );
            self.cache.set_ttl(key, listing, self.listing_ttl).await;
        }

        result
    }

    /// Run an authenticated call, retrying exactly once on a 401 envelope
    ///
    /// Bounded loop: the first attempt uses the current session (logging in
    /// if there is none), a 401 forces one relogin and one repeat, and a
    /// second 401 surfaces. Transport failures are never retried here.
    async fn with_auth_retry<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, AlistError>
    where
        F: Fn(Arc<dyn AlistApi>, String) -> Fut,
        Fut: Future<Output = Result<T, AlistError>>,
    {
        for attempt in 0..2 {
            let token = if attempt == 0 {
                self.ensure_token().await?
            } else {
                warn!(
                    operation = operation,
                    "Session expired upstream, logging in again"
                );
                self.relogin().await?
            };

            match call(Arc::clone(&self.api), token).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unauthorized() && attempt == 0 => continue,
                Err(e) => return Err(e),
            }
        }

        unreachable!("auth retry loop is bounded to two attempts")
    }

    /// Current token, establishing a session if none is held
    async fn ensure_token(&self) -> Result<String, AlistError> {
        let mut session = self.session.lock().await;
        if let Some(token) = &session.token {
            return Ok(token.clone());
        }
        self.login_locked(&mut session).await
    }

    /// Discard the held token and log in again
    async fn relogin(&self) -> Result<String, AlistError> {
        let mut session = self.session.lock().await;
        session.token = None;
        self.login_locked(&mut session).await
    }

    /// Exchange credentials for a token, enforcing the attempt ceiling
    ///
    /// On success the attempt counter resets to zero. On failure it
    /// increments; reaching the ceiling raises `TooManyLoginAttempts` and
    /// resets the counter so corrected credentials can try again later.
    async fn login_locked(&self, session: &mut Session) -> Result<String, AlistError> {
        match self.api.login(&self.username, &self.password).await {
            Ok(token) => {
                info!(user = %self.username, "Logged in to upstream");
                session.token = Some(token.clone());
                session.login_attempts = 0;
                Ok(token)
            }
            Err(e) => {
                session.token = None;
                session.login_attempts += 1;
                warn!(
                    attempts = session.login_attempts,
                    max = self.max_login_attempts,
                    error = %e,
                    "Upstream login failed"
                );

                if session.login_attempts >= self.max_login_attempts {
                    session.login_attempts = 0;
                    return Err(AlistError::TooManyLoginAttempts);
                }

                Err(as_auth_error(e))
            }
        }
    }
}
