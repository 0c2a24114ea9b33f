//! Stored responses and freshness.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A response as held by a store.
///
/// `cached_at` is attached by the cache layer when the response is admitted,
/// never by the origin. A response without it is always expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl StoredResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { status, status_text: status_text.into(), headers: BTreeMap::new(), body: body.into(), cached_at: None }
    }

    /// Builder-style header insertion. Header names are lowercased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Plain-text response produced by the cache layer itself.
    pub fn synthesized(status: u16, status_text: &str, body: &str) -> Self {
        Self::new(status, status_text, body.as_bytes()).with_header("content-type", "text/plain; charset=utf-8")
    }

    /// Whether the status indicates success (2xx). Only such responses are
    /// admitted to a store.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Copy stamped with the retrieval time.
    pub fn stamped(&self, now: DateTime<Utc>) -> Self {
        Self { cached_at: Some(now), ..self.clone() }
    }

    /// Expired iff unstamped or `now - cached_at > max_age`.
    pub fn is_expired_at(&self, max_age: TimeDelta, now: DateTime<Utc>) -> bool {
        match self.cached_at {
            Some(cached_at) => now - cached_at > max_age,
            None => true,
        }
    }

    pub fn is_expired(&self, max_age: TimeDelta) -> bool {
        self.is_expired_at(max_age, Utc::now())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> TimeDelta {
        TimeDelta::hours(24)
    }

    #[test]
    fn test_unstamped_is_expired() {
        let response = StoredResponse::new(200, "OK", "body");
        assert!(response.is_expired(day()));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let response = StoredResponse::new(200, "OK", "body").stamped(now);
        assert!(!response.is_expired_at(day(), now));
        assert!(!response.is_expired_at(day(), now + day()));
        assert!(response.is_expired_at(day(), now + day() + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_is_ok() {
        assert!(StoredResponse::new(200, "OK", "").is_ok());
        assert!(StoredResponse::new(204, "No Content", "").is_ok());
        assert!(!StoredResponse::new(304, "Not Modified", "").is_ok());
        assert!(!StoredResponse::new(500, "Internal Server Error", "").is_ok());
    }

    #[test]
    fn test_synthesized() {
        let response = StoredResponse::synthesized(404, "Not Found", "Asset not available");
        assert_eq!(response.body_text(), "Asset not available");
        assert_eq!(response.headers.get("content-type").unwrap(), "text/plain; charset=utf-8");
        assert!(response.cached_at.is_none());
    }
}
