//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `network_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_entries` or `max_age_secs` is not positive
    /// - `app_version`, `cache_prefix` or `user_agent` is empty
    /// - `origin` is not an absolute http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.network_timeout_ms < 100 {
            return Err(invalid("network_timeout_ms", "must be at least 100ms"));
        }
        if self.network_timeout_ms > 300_000 {
            return Err(invalid("network_timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_entries == 0 {
            return Err(invalid("max_entries", "must be at least 1"));
        }
        if self.max_age_secs < 1 {
            return Err(invalid("max_age_secs", "must be at least 1 second"));
        }

        if self.app_version.trim().is_empty() {
            return Err(invalid("app_version", "must not be empty"));
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if let Some(origin) = &self.origin {
            match url::Url::parse(origin) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => {
                    return Err(invalid("origin", &format!("unsupported scheme: {}", parsed.scheme())));
                }
                Err(e) => return Err(invalid("origin", &e.to_string())),
            }
        }

        if self.manifest_path.is_none() {
            tracing::debug!("no manifest_path configured; install will precache nothing");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: &AppConfig) -> Option<String> {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("max_bytes"));

        let config = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("max_bytes"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { network_timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("network_timeout_ms"));

        let config = AppConfig { network_timeout_ms: 301_000, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("network_timeout_ms"));

        let config = AppConfig { network_timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let config = AppConfig { max_entries: 0, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("max_entries"));

        let config = AppConfig { max_age_secs: 0, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("max_age_secs"));
    }

    #[test]
    fn test_validate_empty_strings() {
        let config = AppConfig { app_version: " ".into(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("app_version"));

        let config = AppConfig { cache_prefix: String::new(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("cache_prefix"));

        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("user_agent"));
    }

    #[test]
    fn test_validate_origin() {
        let config = AppConfig { origin: Some("https://app.example".into()), ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { origin: Some("not a url".into()), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("origin"));

        let config = AppConfig { origin: Some("ftp://app.example".into()), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("origin"));
    }
}
