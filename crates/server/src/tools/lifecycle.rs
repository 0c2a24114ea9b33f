//! cache_install and cache_activate tool implementations.

use std::path::{Path, PathBuf};

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::OfflineCache;
use stash_core::{AssetManifest, Error};

use crate::tools::json_result;

/// Input parameters for the cache_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallParams {
    /// Path to a JSON asset manifest. Defaults to the configured manifest.
    #[serde(default)]
    pub manifest_path: Option<String>,
}

pub async fn install_impl(
    cache: &OfflineCache, default_manifest: Option<&Path>, params: CacheInstallParams,
) -> Result<CallToolResult, McpError> {
    let path = params.manifest_path.map(PathBuf::from);
    let path = path.as_deref().or(default_manifest);
    if path.is_none() {
        tracing::warn!("no asset manifest configured, installing empty stores");
    }

    let manifest = AssetManifest::load(path)?;
    let report = cache.install(&manifest).await?;
    json_result(&report)
}

pub async fn activate_impl(cache: &OfflineCache) -> Result<CallToolResult, McpError> {
    let report = cache.activate().await?;
    json_result(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{offline_cache, parse_output};
    use stash_client::{ActivationReport, InstallReport, Phase};
    use stash_core::StoreRole;

    const MANIFEST: &str = r#"{
        "static": ["/app.js", "/app.css"],
        "html": ["/", "/index.html"],
        "chunks": ["/chunks/a.js"],
        "media": ["/logo.png"]
    }"#;

    #[tokio::test]
    async fn test_install_from_configured_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, MANIFEST).unwrap();

        let (cache, _) = offline_cache();
        let result = install_impl(&cache, Some(&path), CacheInstallParams::default()).await.unwrap();
        let report: InstallReport = parse_output(&result);

        assert_eq!(report.total(), 6);
        assert_eq!(report.cached(), 6);
        assert_eq!(report.store(StoreRole::Static).map(|s| s.total), Some(4));
        assert_eq!(report.store(StoreRole::Html).map(|s| s.total), Some(2));
        assert_eq!(cache.phase().await, Phase::Installed);
    }

    #[tokio::test]
    async fn test_install_param_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"html": ["/offline.html"]}"#).unwrap();

        let (cache, _) = offline_cache();
        let params = CacheInstallParams { manifest_path: Some(path.display().to_string()) };
        let result = install_impl(&cache, Some(Path::new("/nonexistent/manifest.json")), params)
            .await
            .unwrap();
        let report: InstallReport = parse_output(&result);
        assert_eq!(report.total(), 1);
    }

    #[tokio::test]
    async fn test_install_missing_manifest_fails() {
        let (cache, _) = offline_cache();
        let params = CacheInstallParams { manifest_path: Some("/nonexistent/manifest.json".into()) };

        let err = install_impl(&cache, None, params).await.unwrap_err();
        assert_eq!(err.code.0, -32013);
    }

    #[tokio::test]
    async fn test_activate() {
        let (cache, _) = offline_cache();
        install_impl(&cache, None, CacheInstallParams::default()).await.unwrap();

        let report: ActivationReport = parse_output(&activate_impl(&cache).await.unwrap());
        assert!(report.deleted.is_empty());
        assert_eq!(report.retained.len(), 3);
        assert_eq!(cache.phase().await, Phase::Active);
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let (cache, _) = offline_cache();

        let err = activate_impl(&cache).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert_eq!(cache.phase().await, Phase::Pending);
    }
}
