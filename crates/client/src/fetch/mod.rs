//! Network transport underneath the cache layer.
//!
//! ### Transport contract
//! - A transport answers with whatever status the origin returned; only
//!   connection-level problems are errors (`HTTP_ERROR`, `FETCH_TOO_LARGE`)
//! - Deciding whether a response is admissible to a store is the strategy
//!   engine's job, not the transport's
//!
//! ### Timeout race
//! - [`fetch_with_timeout`] races the fetch against a timer; whichever settles
//!   first decides the outcome and the loser is dropped

pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header};
use stash_core::{Error, StoredResponse};

pub use self::url::{UrlError, resolve};
pub use ::url::Url;

/// Something that can perform a network GET.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn fetch(&self, url: &Url) -> Result<StoredResponse, Error>;
}

/// Run one network attempt, failing with `FETCH_TIMEOUT` if nothing
/// arrives within `timeout`.
pub async fn fetch_with_timeout(
    transport: &dyn Transport, url: &Url, timeout: Duration,
) -> Result<StoredResponse, Error> {
    tokio::select! {
        result = transport.fetch(url) => result,
        _ = tokio::time::sleep(timeout) => {
            tracing::debug!("network attempt for {} timed out after {}ms", url, timeout.as_millis());
            Err(Error::FetchTimeout(format!("{url} after {}ms", timeout.as_millis())))
        }
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "stash/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Client-level request timeout (default: 20s); the strategy engine's
    /// shorter race timeout normally fires first
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "stash/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn header_map(headers: &header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<StoredResponse, Error> {
        let start = Instant::now();

        let response = self.http.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{url}: {e}"))
            } else {
                Error::HttpError(format!("network error: {}", e))
            }
        })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers = header_map(response.headers());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(StoredResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes.to_vec(),
            cached_at: None,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "stash/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_http_transport_new() {
        let transport = HttpTransport::new(FetchConfig::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn test_header_map_lowercases() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/css"));
        let map = header_map(&headers);
        assert_eq!(map.get("content-type").map(String::as_str), Some("text/css"));
    }

    #[tokio::test]
    async fn test_timeout_race_prefers_fast_fetch() {
        let transport = ScriptedTransport::new().respond("https://app.example/app.js", 200, "ok");
        let url = Url::parse("https://app.example/app.js").unwrap();
        let response = fetch_with_timeout(&transport, &url, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.body_text(), "ok");
    }

    #[tokio::test]
    async fn test_timeout_race_times_out() {
        let transport = ScriptedTransport::new().hang("https://app.example/slow");
        let url = Url::parse("https://app.example/slow").unwrap();
        let result = fetch_with_timeout(&transport, &url, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(Error::FetchTimeout(_))));
    }
}
