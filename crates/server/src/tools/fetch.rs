//! cache_fetch tool implementation.
//!
//! Runs one request through the request hook and reports what the layer
//! served and where it came from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::{OfflineCache, RequestCategory};
use stash_core::Error;

use crate::tools::json_result;

/// Input parameters for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Absolute URL, or a path relative to the configured origin.
    pub url: String,
}

/// Output structure for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchOutput {
    /// The resolved URL.
    pub url: String,
    pub category: RequestCategory,
    /// One of "network", "cache", "stale-cache", "synthesized" or "bypass".
    pub source: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// Response body decoded as UTF-8, lossy.
    pub body: String,
    /// When the served entry entered its store, if it came from one.
    pub cached_at: Option<DateTime<Utc>>,
}

pub async fn fetch_impl(cache: &OfflineCache, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url must not be empty".to_string()).into());
    }

    let handled = cache.fetch(&params.url).await?;
    let source = handled.source.map_or("bypass", |source| source.as_str());
    tracing::debug!(url = %handled.url, category = ?handled.category, source, status = handled.response.status, "served");

    let output = CacheFetchOutput {
        url: handled.url.to_string(),
        category: handled.category,
        source: source.to_string(),
        status: handled.response.status,
        status_text: handled.response.status_text.clone(),
        body: handled.response.body_text(),
        cached_at: handled.response.cached_at,
        headers: handled.response.headers,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{active_cache, offline_cache, parse_output};

    fn params(url: &str) -> CacheFetchParams {
        CacheFetchParams { url: url.to_string() }
    }

    #[tokio::test]
    async fn test_fetch_online_then_offline() {
        let (cache, transport) = active_cache().await;

        let online: CacheFetchOutput = parse_output(&fetch_impl(&cache, params("/feed")).await.unwrap());
        assert_eq!(online.category, RequestCategory::Dynamic);
        assert_eq!(online.source, "network");
        assert_eq!(online.body, "/feed");
        assert!(online.cached_at.is_none());
        cache.shutdown().await;

        transport.go_offline();

        let offline: CacheFetchOutput = parse_output(&fetch_impl(&cache, params("/feed")).await.unwrap());
        assert_eq!(offline.source, "cache");
        assert_eq!(offline.body, "/feed");
        assert!(offline.cached_at.is_some());
        assert_eq!(offline.headers.get("content-type").map(String::as_str), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_fetch_offline_html_is_synthesized() {
        let (cache, transport) = active_cache().await;
        transport.go_offline();

        let output: CacheFetchOutput = parse_output(&fetch_impl(&cache, params("/about.html")).await.unwrap());
        assert_eq!(output.source, "synthesized");
        assert_eq!(output.status, 503);
        assert_eq!(output.body, "Offline - No cached version available");
    }

    #[tokio::test]
    async fn test_fetch_bypass() {
        let (cache, _) = active_cache().await;

        let output: CacheFetchOutput = parse_output(&fetch_impl(&cache, params("/api/chat")).await.unwrap());
        assert_eq!(output.category, RequestCategory::Bypass);
        assert_eq!(output.source, "bypass");
        assert_eq!(output.status, 200);
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_urls() {
        let (cache, _) = active_cache().await;

        let err = fetch_impl(&cache, params("  ")).await.unwrap_err();
        assert_eq!(err.code.0, -32602);

        let err = fetch_impl(&cache, params("ftp://app.example/file")).await.unwrap_err();
        assert_eq!(err.code.0, -32003);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_is_not_intercepted() {
        let (cache, _) = offline_cache();

        let output: CacheFetchOutput = parse_output(&fetch_impl(&cache, params("/feed")).await.unwrap());
        assert_eq!(output.category, RequestCategory::Dynamic);
        assert_eq!(output.source, "bypass");
        assert_eq!(output.body, "/feed");

        let status = cache.status().await.unwrap();
        assert!(status.stores.iter().all(|s| s.entries == 0));
    }
}
