//! Cache generations and store naming.
//!
//! Every store name embeds the current [`CacheVersion`], so a new build
//! produces a fresh set of stores and activation can drop the old ones by
//! name alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Application version used when the build supplies none.
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

/// Identifies one generation of all stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheVersion(String);

impl CacheVersion {
    /// Derive the version from an application version and optional build timestamp.
    pub fn new(app_version: &str, build_timestamp: Option<i64>) -> Self {
        let app_version = if app_version.trim().is_empty() { DEFAULT_APP_VERSION } else { app_version.trim() };
        match build_timestamp {
            Some(ts) => Self(format!("v{app_version}-{ts}")),
            None => Self(format!("v{app_version}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CacheVersion {
    fn default() -> Self {
        Self::new(DEFAULT_APP_VERSION, None)
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role a store plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreRole {
    Static,
    Html,
    Dynamic,
}

impl StoreRole {
    pub const ALL: [StoreRole; 3] = [StoreRole::Static, StoreRole::Html, StoreRole::Dynamic];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreRole::Static => "static",
            StoreRole::Html => "html",
            StoreRole::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(StoreRole::Static),
            "html" => Ok(StoreRole::Html),
            "dynamic" => Ok(StoreRole::Dynamic),
            other => Err(Error::InvalidInput(format!("unknown store role: {other}"))),
        }
    }
}

/// The three live store names for one cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
    prefix: String,
    version: CacheVersion,
}

impl StoreNames {
    pub fn new(prefix: impl Into<String>, version: CacheVersion) -> Self {
        Self { prefix: prefix.into(), version }
    }

    /// Store name for a role, `{prefix}-{role}-{version}`.
    pub fn name(&self, role: StoreRole) -> String {
        format!("{}-{}-{}", self.prefix, role, self.version)
    }

    /// All current store names, in role order.
    pub fn all(&self) -> Vec<String> {
        StoreRole::ALL.iter().map(|role| self.name(*role)).collect()
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `name` belongs to this namespace but not to the current generation.
    pub fn is_stale(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-", self.prefix)) && !StoreRole::ALL.iter().any(|role| self.name(*role) == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_with_timestamp() {
        let version = CacheVersion::new("2.3.1", Some(1_700_000_000));
        assert_eq!(version.as_str(), "v2.3.1-1700000000");
    }

    #[test]
    fn test_version_defaults() {
        assert_eq!(CacheVersion::default().as_str(), "v1.0.0");
        assert_eq!(CacheVersion::new("  ", None).as_str(), "v1.0.0");
    }

    #[test]
    fn test_store_names_embed_version() {
        let names = StoreNames::new("stash", CacheVersion::new("1.0.0", Some(42)));
        assert_eq!(names.name(StoreRole::Static), "stash-static-v1.0.0-42");
        assert_eq!(names.name(StoreRole::Html), "stash-html-v1.0.0-42");
        assert_eq!(names.name(StoreRole::Dynamic), "stash-dynamic-v1.0.0-42");
        assert_eq!(names.all().len(), 3);
    }

    #[test]
    fn test_is_stale() {
        let names = StoreNames::new("stash", CacheVersion::new("1.0.0", Some(42)));
        assert!(names.is_stale("stash-static-v1.0.0-41"));
        assert!(names.is_stale("stash-html-v0.9.0"));
        assert!(!names.is_stale("stash-dynamic-v1.0.0-42"));
        assert!(!names.is_stale("other-app-static-v0.1.0"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("HTML".parse::<StoreRole>().unwrap(), StoreRole::Html);
        assert!("media".parse::<StoreRole>().is_err());
    }
}
