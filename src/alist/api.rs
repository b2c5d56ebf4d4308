//! Alist HTTP Transport
//!
//! The raw wire exchange with an Alist server, behind a trait so the session
//! and retry logic above it can be tested against a scripted server. The
//! envelope `code` is authoritative; the HTTP status line only matters when
//! the body is not an envelope at all.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::errors::AlistError;
use super::types::{DirListing, Envelope, FileInfo, LoginData};

/// Wire operations against an Alist server
///
/// One method per endpoint. The session token is a plain argument; the
/// transport owns no session state.
#[async_trait]
pub trait AlistApi: Send + Sync {
    /// Exchange credentials for a session token via POST /api/auth/login
    async fn login(&self, username: &str, password: &str) -> Result<String, AlistError>;

    /// Probe whether a token is still accepted via GET /api/me
    async fn me(&self, token: &str) -> Result<(), AlistError>;

    /// Fetch one directory's listing via GET /api/fs/list
    async fn list(&self, token: &str, path: &str) -> Result<DirListing, AlistError>;

    /// Fetch one file's detail via GET /api/fs/get
    async fn file_info(&self, token: &str, path: &str) -> Result<FileInfo, AlistError>;

    /// Upload a file into a directory via POST /api/fs/upload
    async fn upload(
        &self,
        token: &str,
        path: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<(), AlistError>;

    /// Remove a file via DELETE /api/fs/delete
    async fn delete(&self, token: &str, path: &str) -> Result<(), AlistError>;
}

/// reqwest-backed transport
pub struct HttpAlistApi {
    http: Client,
    base_url: String,
}

impl HttpAlistApi {
    /// Create a transport for the server at `base_url`
    ///
    /// No request deadline is set here; callers impose their own.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a request and unwrap the envelope, requiring a data payload
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AlistError> {
        let envelope: Envelope<T> = self.roundtrip(request).await?;
        envelope
            .data
            .ok_or_else(|| AlistError::InvalidResponse("envelope carried no data".to_string()))
    }

    /// Send a request and unwrap the envelope, ignoring any data payload
    async fn execute_unit(&self, request: reqwest::RequestBuilder) -> Result<(), AlistError> {
        let _: Envelope<serde_json::Value> = self.roundtrip(request).await?;
        Ok(())
    }

    async fn roundtrip<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>, AlistError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: Envelope<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            // A non-envelope body with an HTTP error status is a gateway or
            // proxy page, not an API answer
            Err(_) if !status.is_success() => {
                return Err(AlistError::Transport(format!("HTTP {}", status)));
            }
            Err(e) => return Err(AlistError::InvalidResponse(e.to_string())),
        };

        if envelope.code != 200 {
            trace!(
                code = envelope.code,
                message = %envelope.message,
                "Upstream envelope error"
            );
            return Err(AlistError::from_envelope(envelope.code, &envelope.message));
        }

        Ok(envelope)
    }
}

#[async_trait]
impl AlistApi for HttpAlistApi {
    async fn login(&self, username: &str, password: &str) -> Result<String, AlistError> {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });
        let data: LoginData = self
            .execute(self.http.post(self.url("/api/auth/login")).json(&body))
            .await?;
        Ok(data.token)
    }

    async fn me(&self, token: &str) -> Result<(), AlistError> {
        self.execute_unit(
            self.http
                .get(self.url("/api/me"))
                .header("Authorization", token),
        )
        .await
    }

    async fn list(&self, token: &str, path: &str) -> Result<DirListing, AlistError> {
        self.execute(
            self.http
                .get(self.url("/api/fs/list"))
                .header("Authorization", token)
                .query(&[("path", path)]),
        )
        .await
    }

    async fn file_info(&self, token: &str, path: &str) -> Result<FileInfo, AlistError> {
        self.execute(
            self.http
                .get(self.url("/api/fs/get"))
                .header("Authorization", token)
                .query(&[("path", path)]),
        )
        .await
    }

    async fn upload(
        &self,
        token: &str,
        path: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<(), AlistError> {
        let part = reqwest::multipart::Part::bytes(content).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        self.execute_unit(
            self.http
                .post(self.url("/api/fs/upload"))
                .header("Authorization", token)
                .query(&[("path", path)])
                .multipart(form),
        )
        .await
    }

    async fn delete(&self, token: &str, path: &str) -> Result<(), AlistError> {
        self.execute_unit(
            self.http
                .delete(self.url("/api/fs/delete"))
                .header("Authorization", token)
                .query(&[("path", path)]),
        )
        .await
    }
}
