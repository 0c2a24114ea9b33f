//! Strategy engine: per-category fetch policies.
//!
//! Each category maps to one entry of a strategy table:
//!
//! | category        | strategy      | store   | fallback on network failure          |
//! |-----------------|---------------|---------|--------------------------------------|
//! | bypass          | none          | none    | not intercepted                      |
//! | html            | network-first | html    | fresh entry, else 503                |
//! | dynamic         | network-first | dynamic | any entry, else 503                  |
//! | static, image   | cache-first   | static  | any entry, else 404                  |
//!
//! Every policy makes at most one network attempt per request. Successful
//! (2xx) network responses are stamped and written to the store; the entry
//! ceiling is then enforced by a detached task so eviction never delays the
//! response. A non-2xx answer is never stored: a usable cached entry is
//! preferred over it, otherwise it is returned unchanged.

use std::sync::Arc;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_core::{CachePolicy, CacheStorage, Error, NamedStore, StoreNames, StoreRole, StoredResponse};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use url::Url;

use crate::classify::RequestCategory;
use crate::fetch::{Transport, fetch_with_timeout};
use crate::lifecycle::enforce_max_entries;

pub const OFFLINE_HTML_BODY: &str = "Offline - No cached version available";
pub const ASSET_UNAVAILABLE_BODY: &str = "Asset not available";
pub const DYNAMIC_UNAVAILABLE_BODY: &str = "Content not available offline";

/// Fetch policy selected for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not intercepted; the request goes to the network untouched.
    Bypass,
    /// Serve a fresh stored entry without contacting the network.
    CacheFirst { role: StoreRole },
    /// Prefer the network; `serve_expired` decides whether an expired entry
    /// may stand in when the network fails.
    NetworkFirst { role: StoreRole, serve_expired: bool },
}

impl Strategy {
    pub fn for_category(category: RequestCategory) -> Self {
        match category {
            RequestCategory::Bypass => Strategy::Bypass,
            RequestCategory::Html => Strategy::NetworkFirst { role: StoreRole::Html, serve_expired: false },
            RequestCategory::Dynamic => Strategy::NetworkFirst { role: StoreRole::Dynamic, serve_expired: true },
            RequestCategory::Static | RequestCategory::Image => Strategy::CacheFirst { role: StoreRole::Static },
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Network,
    Cache,
    StaleCache,
    Synthesized,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::StaleCache => "stale-cache",
            ResponseSource::Synthesized => "synthesized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: StoredResponse,
    pub source: ResponseSource,
}

impl Served {
    fn new(response: StoredResponse, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Outcome of the request hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Delegate to the network unmodified.
    Bypass,
    Respond(Served),
}

fn log_fetch_failure(key: &str, error: &Error) {
    if error.is_network() {
        tracing::debug!("network failed for {}: {}", key, error);
    } else {
        tracing::warn!(key, error = %error, "unexpected transport failure");
    }
}

/// Synthesized answer when neither network nor store can serve a role.
pub fn unavailable(role: StoreRole) -> StoredResponse {
    match role {
        StoreRole::Html => StoredResponse::synthesized(503, "Service Unavailable", OFFLINE_HTML_BODY),
        StoreRole::Static => StoredResponse::synthesized(404, "Not Found", ASSET_UNAVAILABLE_BODY),
        StoreRole::Dynamic => StoredResponse::synthesized(503, "Service Unavailable", DYNAMIC_UNAVAILABLE_BODY),
    }
}

pub struct StrategyEngine {
    storage: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    names: StoreNames,
    policy: CachePolicy,
    evictions: Mutex<JoinSet<()>>,
}

impl StrategyEngine {
    pub fn new(
        storage: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>, names: StoreNames, policy: CachePolicy,
    ) -> Self {
        Self { storage, transport, names, policy, evictions: Mutex::new(JoinSet::new()) }
    }

    /// Run the policy for `category` against `url`.
    pub async fn execute(&self, category: RequestCategory, url: &Url) -> Interception {
        match Strategy::for_category(category) {
            Strategy::Bypass => Interception::Bypass,
            Strategy::CacheFirst { role } => Interception::Respond(self.cache_first(role, url).await),
            Strategy::NetworkFirst { role, serve_expired } => {
                Interception::Respond(self.network_first(role, serve_expired, url).await)
            }
        }
    }

    async fn network_first(&self, role: StoreRole, serve_expired: bool, url: &Url) -> Served {
        let key = url.as_str();
        match fetch_with_timeout(self.transport.as_ref(), url, self.policy.network_timeout).await {
            Ok(response) if response.is_ok() => {
                self.admit(role, key, &response).await;
                Served::new(response, ResponseSource::Network)
            }
            Ok(response) => {
                tracing::debug!("{} answered {} for {}, trying {} store", url, response.status, key, role);
                self.fallback(role, key, serve_expired)
                    .await
                    .unwrap_or_else(|| Served::new(response, ResponseSource::Network))
            }
            Err(e) => {
                log_fetch_failure(key, &e);
                self.fallback(role, key, serve_expired)
                    .await
                    .unwrap_or_else(|| Served::new(unavailable(role), ResponseSource::Synthesized))
            }
        }
    }

    async fn cache_first(&self, role: StoreRole, url: &Url) -> Served {
        let key = url.as_str();
        let cached = self.lookup(role, key).await;

        if let Some(entry) = &cached
            && !entry.is_expired(self.policy.max_age)
        {
            tracing::debug!("{} store hit for {}", role, key);
            return Served::new(entry.clone(), ResponseSource::Cache);
        }

        let stale = cached.map(|entry| Served::new(entry, ResponseSource::StaleCache));

        match fetch_with_timeout(self.transport.as_ref(), url, self.policy.network_timeout).await {
            Ok(response) if response.is_ok() => {
                self.admit(role, key, &response).await;
                Served::new(response, ResponseSource::Network)
            }
            Ok(response) => stale.unwrap_or_else(|| Served::new(response, ResponseSource::Network)),
            Err(e) => {
                log_fetch_failure(key, &e);
                stale.unwrap_or_else(|| Served::new(unavailable(role), ResponseSource::Synthesized))
            }
        }
    }

    /// Stored entry usable after a network failure, if any.
    async fn fallback(&self, role: StoreRole, key: &str, serve_expired: bool) -> Option<Served> {
        let entry = self.lookup(role, key).await?;
        if !entry.is_expired(self.policy.max_age) {
            return Some(Served::new(entry, ResponseSource::Cache));
        }
        serve_expired.then(|| Served::new(entry, ResponseSource::StaleCache))
    }

    /// Store read; backend failures count as a miss.
    async fn lookup(&self, role: StoreRole, key: &str) -> Option<StoredResponse> {
        let store = NamedStore::new(self.names.name(role));
        match self.storage.get(&store, key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(store = store.name(), key, error = %e, "store read failed, treating as miss");
                None
            }
        }
    }

    /// Stamp and store a successful network response, then schedule eviction.
    async fn admit(&self, role: StoreRole, key: &str, response: &StoredResponse) {
        let store = NamedStore::new(self.names.name(role));
        let stamped = response.stamped(Utc::now());
        if let Err(e) = self.storage.put(&store, key, &stamped).await {
            tracing::warn!(store = store.name(), key, error = %e, "store write failed");
            return;
        }
        self.schedule_eviction(store).await;
    }

    async fn schedule_eviction(&self, store: NamedStore) {
        let storage = Arc::clone(&self.storage);
        let max_entries = self.policy.max_entries;

        let mut tasks = self.evictions.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            match enforce_max_entries(storage.as_ref(), &store, max_entries).await {
                Ok(0) => {}
                Ok(evicted) => tracing::debug!(store = store.name(), evicted, "evicted oldest entries"),
                Err(e) => tracing::warn!(store = store.name(), error = %e, "eviction failed"),
            }
        });
    }

    /// Wait for every outstanding eviction task.
    pub async fn drain_evictions(&self) {
        let mut tasks = std::mem::take(&mut *self.evictions.lock().await);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "eviction task aborted");
            }
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }
}
