//! HTTP backend abstraction for the Civitai API.
//!
//! The client is generic over this trait so tests can inject canned
//! responses. The production implementation wraps a single pooled
//! `reqwest::Client`; the bearer token is attached per request, not baked
//! into the client, so hosts can rebuild the client on config changes
//! without losing the pool.
//!
//! There is deliberately no retry logic here: one attempt per request,
//! callers decide whether to re-enqueue.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{CivitaiError, CivitaiResult};

/// A streaming file response.
pub struct RemoteFile {
    /// Filename suggested by `Content-Disposition`, when present.
    pub filename_hint: Option<String>,
    /// `Content-Length`, when the server sent one.
    pub total_bytes: Option<u64>,
    /// The body as a chunk stream.
    pub stream: BoxStream<'static, CivitaiResult<Bytes>>,
}

/// Trait for HTTP backends the Civitai client runs on.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Fetch JSON from a URL and deserialize it.
    async fn get_json<T: DeserializeOwned + Send>(&self, url: &Url) -> CivitaiResult<T>;

    /// Open a streaming GET for a (large) file.
    async fn get_file(&self, url: &Url) -> CivitaiResult<RemoteFile>;

    /// Fetch a small body in full, bounded by `timeout`.
    async fn get_bytes(&self, url: &Url, timeout: Duration) -> CivitaiResult<Bytes>;
}

/// Production backend over a pooled reqwest client.
pub struct ReqwestBackend {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ReqwestBackend {
    /// Create a backend; `api_key` is attached as a bearer token when set.
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::models::USER_AGENT)
            .build()
            .expect("failed to create HTTP client");

        Self { client, api_key }
    }

    fn build_request(&self, url: &Url) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url.as_str());
        if let Some(ref token) = self.api_key {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }

    /// Send a GET and map non-success statuses to error kinds.
    async fn fetch(&self, url: &Url, timeout: Option<Duration>) -> CivitaiResult<reqwest::Response> {
        let mut request = self.build_request(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(match status.as_u16() {
            401 | 403 => CivitaiError::Unauthorized,
            404 => CivitaiError::NotFound {
                url: url.to_string(),
            },
            429 => CivitaiError::RateLimited,
            code => CivitaiError::ApiRequestFailed {
                status: code,
                url: url.to_string(),
            },
        })
    }
}

/// Pull a filename out of a `Content-Disposition` header value.
fn filename_from_disposition(value: &str) -> Option<String> {
    let (_, rest) = value.split_once("filename=")?;
    let name = rest.trim().trim_matches(|c| c == '"' || c == '\'' || c == ';');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get_json<T: DeserializeOwned + Send>(&self, url: &Url) -> CivitaiResult<T> {
        let response = self.fetch(url, None).await?;
        let data: T = response.json().await?;
        Ok(data)
    }

    async fn get_file(&self, url: &Url) -> CivitaiResult<RemoteFile> {
        let response = self.fetch(url, None).await?;

        let filename_hint = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|h| h.to_str().ok())
            .and_then(filename_from_disposition);
        let total_bytes = response.content_length();

        let stream = response
            .bytes_stream()
            .map_err(CivitaiError::from)
            .boxed();

        Ok(RemoteFile {
            filename_hint,
            total_bytes,
            stream,
        })
    }

    async fn get_bytes(&self, url: &Url, timeout: Duration) -> CivitaiResult<Bytes> {
        let response = self.fetch(url, Some(timeout)).await?;
        Ok(response.bytes().await?)
    }
}

// ============================================================================
// Fake backend for tests
// ============================================================================
