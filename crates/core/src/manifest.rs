//! Build-time asset manifest.
//!
//! The build emits a JSON document grouping cacheable URLs by role. The
//! cache layer only reads it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::version::StoreRole;

/// Role tag of a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    Static,
    Html,
    Chunk,
    Media,
}

impl AssetRole {
    /// Store an asset of this role is precached into.
    pub fn store_role(self) -> StoreRole {
        match self {
            AssetRole::Html => StoreRole::Html,
            AssetRole::Static | AssetRole::Chunk | AssetRole::Media => StoreRole::Static,
        }
    }
}

/// A single URL to precache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub url: String,
    pub role: AssetRole,
}

/// URLs grouped by role, as produced by the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    #[serde(default, rename = "static")]
    pub static_assets: Vec<String>,
    #[serde(default)]
    pub html: Vec<String>,
    #[serde(default)]
    pub chunks: Vec<String>,
    #[serde(default)]
    pub media: Vec<String>,
}

impl AssetManifest {
    /// Parse a manifest from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Load a manifest file. `None` yields the empty manifest.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Manifest(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Flatten into role-tagged entries.
    pub fn entries(&self) -> Vec<ManifestEntry> {
        let groups = [
            (AssetRole::Static, &self.static_assets),
            (AssetRole::Html, &self.html),
            (AssetRole::Chunk, &self.chunks),
            (AssetRole::Media, &self.media),
        ];
        groups
            .into_iter()
            .flat_map(|(role, urls)| urls.iter().map(move |url| ManifestEntry { url: url.clone(), role }))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.static_assets.len() + self.html.len() + self.chunks.len() + self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
