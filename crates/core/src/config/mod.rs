//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STASH_*)
//! 2. TOML config file (if STASH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::policy::{CachePolicy, MAX_AGE_SECS, MAX_ENTRIES, NETWORK_TIMEOUT_MS};
use crate::version::{CacheVersion, DEFAULT_APP_VERSION, StoreNames};

mod validation;

pub use validation::ConfigError;

/// Which store backend to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STASH_*)
/// 2. TOML config file (if STASH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store database.
    ///
    /// Set via STASH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Store backend, `sqlite` or `memory`.
    #[serde(default)]
    pub storage: StorageBackend,

    /// Application version injected by the build.
    ///
    /// Set via STASH_APP_VERSION environment variable.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Build timestamp injected by the build.
    #[serde(default)]
    pub build_timestamp: Option<i64>,

    /// Namespace prefix shared by every store name of this application.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// The application's own origin, e.g. `https://app.example`.
    ///
    /// Relative request URLs are resolved against it and a request for the
    /// bare origin is treated as a document.
    #[serde(default)]
    pub origin: Option<String>,

    /// JSON asset manifest produced by the build.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network attempt timeout in milliseconds.
    ///
    /// Set via STASH_NETWORK_TIMEOUT_MS environment variable.
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    /// Age after which a cached entry is no longer fresh.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: i64,

    /// Entry-count ceiling per store.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stash-cache.sqlite")
}

fn default_app_version() -> String {
    DEFAULT_APP_VERSION.into()
}

fn default_cache_prefix() -> String {
    "stash".into()
}

fn default_user_agent() -> String {
    "stash/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_network_timeout_ms() -> u64 {
    NETWORK_TIMEOUT_MS
}

fn default_max_age_secs() -> i64 {
    MAX_AGE_SECS
}

fn default_max_entries() -> usize {
    MAX_ENTRIES
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage: StorageBackend::default(),
            app_version: default_app_version(),
            build_timestamp: None,
            cache_prefix: default_cache_prefix(),
            origin: None,
            manifest_path: None,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            network_timeout_ms: default_network_timeout_ms(),
            max_age_secs: default_max_age_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl AppConfig {
    /// Network timeout as Duration for use with reqwest/tokio.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::new(&self.app_version, self.build_timestamp)
    }

    pub fn store_names(&self) -> StoreNames {
        StoreNames::new(self.cache_prefix.clone(), self.cache_version())
    }

    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            max_age: TimeDelta::seconds(self.max_age_secs),
            max_entries: self.max_entries,
            network_timeout: self.network_timeout(),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STASH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STASH_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./stash-cache.sqlite"));
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.app_version, "1.0.0");
        assert!(config.build_timestamp.is_none());
        assert_eq!(config.cache_prefix, "stash");
        assert!(config.origin.is_none());
        assert!(config.manifest_path.is_none());
        assert_eq!(config.network_timeout_ms, 5_000);
        assert_eq!(config.max_age_secs, 86_400);
        assert_eq!(config.max_entries, 100);
    }

    #[test]
    fn test_policy_matches_constants() {
        assert_eq!(AppConfig::default().policy(), CachePolicy::default());
    }

    #[test]
    fn test_store_names_from_config() {
        let config = AppConfig { app_version: "2.0.0".into(), build_timestamp: Some(7), ..Default::default() };
        assert_eq!(config.cache_version().as_str(), "v2.0.0-7");
        assert_eq!(
            config.store_names().all(),
            vec!["stash-static-v2.0.0-7", "stash-html-v2.0.0-7", "stash-dynamic-v2.0.0-7"]
        );
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("STASH_APP_VERSION", "3.1.4");
            jail.set_env("STASH_BUILD_TIMESTAMP", "1700000000");
            jail.set_env("STASH_STORAGE", "memory");
            jail.set_env("STASH_ORIGIN", "https://app.example");
            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.cache_version().as_str(), "v3.1.4-1700000000");
            assert_eq!(config.storage, StorageBackend::Memory);
            assert_eq!(config.origin.as_deref(), Some("https://app.example"));
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("stash.toml", "cache_prefix = \"portfolio\"\nmax_entries = 25\n")?;
            jail.set_env("STASH_CONFIG_FILE", "stash.toml");
            jail.set_env("STASH_MAX_ENTRIES", "30");
            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.cache_prefix, "portfolio");
            assert_eq!(config.max_entries, 30);
            Ok(())
        });
    }
}
