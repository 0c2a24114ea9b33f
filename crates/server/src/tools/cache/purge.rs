//! cache_purge tool implementation.
//!
//! Purges entries from one store role, or from all current stores.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::OfflineCache;
use stash_core::StoreRole;

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Store to purge: "static", "html" or "dynamic". All stores when omitted.
    #[serde(default)]
    pub role: Option<StoreRole>,

    /// Only delete entries older than the maximum age.
    #[serde(default)]
    pub expired_only: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: usize,
}

pub async fn purge_impl(cache: &OfflineCache, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = cache.purge(params.role, params.expired_only).await?;
    tracing::info!(role = ?params.role, expired_only = params.expired_only, deleted, "purged cache entries");
    json_result(&CachePurgeOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{active_cache, parse_output};

    #[tokio::test]
    async fn test_purge_single_role() {
        let (cache, _) = active_cache().await;
        cache.fetch("/feed").await.unwrap();
        cache.fetch("/app.js").await.unwrap();
        cache.shutdown().await;

        let params = CachePurgeParams { role: Some(StoreRole::Static), expired_only: false };
        let output: CachePurgeOutput = parse_output(&purge_impl(&cache, params).await.unwrap());
        assert_eq!(output.deleted, 1);

        let params = CachePurgeParams { role: None, expired_only: false };
        let output: CachePurgeOutput = parse_output(&purge_impl(&cache, params).await.unwrap());
        assert_eq!(output.deleted, 1);
    }

    #[tokio::test]
    async fn test_purge_expired_only_keeps_fresh() {
        let (cache, _) = active_cache().await;
        cache.fetch("/feed").await.unwrap();
        cache.shutdown().await;

        let params = CachePurgeParams { role: None, expired_only: true };
        let output: CachePurgeOutput = parse_output(&purge_impl(&cache, params).await.unwrap());
        assert_eq!(output.deleted, 0);
    }

    #[test]
    fn test_params_reject_unknown_role() {
        let parsed: Result<CachePurgeParams, _> = serde_json::from_str(r#"{"role": "media"}"#);
        assert!(parsed.is_err());

        let parsed: CachePurgeParams = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.role, None);
        assert!(!parsed.expired_only);
    }
}
