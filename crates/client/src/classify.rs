//! Request classification.
//!
//! Maps an outgoing request URL to the category that selects its fetch
//! policy. Pure: no network or store access. Rules are evaluated in order
//! and the first match wins:
//!
//! 1. a `webhook` path segment or an `/api/` path prefix: bypass
//! 2. `.html` extension, trailing `/`, or the application origin itself: html
//! 3. script, style and font extensions: static
//! 4. image extensions: image
//! 5. anything else: dynamic
//!
//! Matching is case-insensitive and ignores the query string.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

const STATIC_EXTENSIONS: &[&str] = &["js", "css", "woff", "woff2", "ttf", "eot"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico"];

/// Category of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    Bypass,
    Html,
    Static,
    Image,
    Dynamic,
}

#[derive(Debug, Clone, Default)]
pub struct RequestClassifier {
    origin: Option<Url>,
}

impl RequestClassifier {
    pub fn new(origin: Option<Url>) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    /// Classify a raw URL string. Total: unparsable input is classified by
    /// its text alone.
    pub fn classify(&self, url: &str) -> RequestCategory {
        let trimmed = url.trim();
        let parsed = Url::parse(trimmed)
            .ok()
            .or_else(|| self.origin.as_ref().and_then(|origin| origin.join(trimmed).ok()));

        match parsed {
            Some(parsed) => self.classify_url(&parsed),
            None => {
                let path = trimmed.split(['?', '#']).next().unwrap_or_default();
                classify_path(&path.to_ascii_lowercase(), false)
            }
        }
    }

    /// Classify an already resolved URL.
    pub fn classify_url(&self, url: &Url) -> RequestCategory {
        let is_origin = self
            .origin
            .as_ref()
            .is_some_and(|origin| origin.origin() == url.origin() && matches!(url.path(), "" | "/"));
        classify_path(&url.path().to_ascii_lowercase(), is_origin)
    }
}

fn extension(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty()).then_some(ext)
}

fn classify_path(path: &str, is_origin: bool) -> RequestCategory {
    let webhook = path.split('/').any(|segment| segment.starts_with("webhook"));
    if webhook || path.starts_with("/api/") {
        return RequestCategory::Bypass;
    }

    let ext = extension(path);

    if is_origin || path.ends_with('/') || ext == Some("html") {
        return RequestCategory::Html;
    }

    match ext {
        Some(ext) if STATIC_EXTENSIONS.contains(&ext) => RequestCategory::Static,
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => RequestCategory::Image,
        _ => RequestCategory::Dynamic,
    }
}
