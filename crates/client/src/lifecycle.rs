//! Lifecycle manager: install, activation, expiry and eviction.
//!
//! Install precaches every manifest URL concurrently and never fails because
//! of a single asset. Activation deletes stores from previous generations and
//! leaves exactly the three current stores. Eviction keeps each store at or
//! below the entry ceiling by dropping the oldest insertions first; reads do
//! not refresh an entry's position.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_core::{
    AssetManifest, CachePolicy, CacheStorage, Error, ManifestEntry, NamedStore, StoreNames, StoreRole, StoredResponse,
};
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{Transport, fetch_with_timeout, resolve};

/// Delete the oldest entries of `store` until at most `max_entries` remain.
///
/// The backend selects and deletes in one step, so a key re-put while
/// eviction runs keeps its new position. Returns the number of entries removed.
pub async fn enforce_max_entries(
    storage: &dyn CacheStorage, store: &NamedStore, max_entries: usize,
) -> Result<usize, Error> {
    storage.evict_oldest(store, max_entries).await
}

/// Precache outcome for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoreReport {
    pub store: String,
    pub role: StoreRole,
    pub cached: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub stores: Vec<StoreReport>,
}

impl InstallReport {
    pub fn cached(&self) -> usize {
        self.stores.iter().map(|s| s.cached).sum()
    }

    pub fn total(&self) -> usize {
        self.stores.iter().map(|s| s.total).sum()
    }

    pub fn store(&self, role: StoreRole) -> Option<&StoreReport> {
        self.stores.iter().find(|s| s.role == role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub retained: Vec<String>,
}

pub struct Lifecycle {
    storage: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    names: StoreNames,
    policy: CachePolicy,
    origin: Option<Url>,
}

impl Lifecycle {
    pub fn new(
        storage: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>, names: StoreNames, policy: CachePolicy,
        origin: Option<Url>,
    ) -> Self {
        Self { storage, transport, names, policy, origin }
    }

    pub fn names(&self) -> &StoreNames {
        &self.names
    }

    /// Whether an entry may be served without consulting the network.
    pub fn is_expired(&self, entry: &StoredResponse) -> bool {
        entry.is_expired(self.policy.max_age)
    }

    /// Populate the stores from the manifest.
    ///
    /// All fetches run concurrently and every one is awaited; individual
    /// failures only lower the per-store `cached` count.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if a precache task cannot be joined.
    pub async fn install(&self, manifest: &AssetManifest) -> Result<InstallReport, Error> {
        let mut totals: BTreeMap<StoreRole, (usize, usize)> = BTreeMap::new();
        for role in StoreRole::ALL {
            self.storage.open(&self.names.name(role)).await?;
            totals.insert(role, (0, 0));
        }

        let mut tasks = JoinSet::new();
        for entry in manifest.entries() {
            let role = entry.role.store_role();
            if let Some((_, total)) = totals.get_mut(&role) {
                *total += 1;
            }

            let storage = Arc::clone(&self.storage);
            let transport = Arc::clone(&self.transport);
            let store = NamedStore::new(self.names.name(role));
            let origin = self.origin.clone();
            let timeout = self.policy.network_timeout;

            tasks.spawn(async move {
                let outcome = precache(storage.as_ref(), transport.as_ref(), &store, &entry, origin.as_ref(), timeout).await;
                if let Err(e) = &outcome {
                    tracing::warn!(url = %entry.url, store = store.name(), error = %e, "precache failed");
                }
                (role, outcome.is_ok())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (role, cached) = joined.map_err(|e| Error::InstallFailed(e.to_string()))?;
            if cached && let Some((count, _)) = totals.get_mut(&role) {
                *count += 1;
            }
        }

        for role in StoreRole::ALL {
            let store = NamedStore::new(self.names.name(role));
            if let Err(e) = enforce_max_entries(self.storage.as_ref(), &store, self.policy.max_entries).await {
                tracing::warn!(store = store.name(), error = %e, "post-install eviction failed");
            }
        }

        let stores = totals
            .into_iter()
            .map(|(role, (cached, total))| StoreReport { store: self.names.name(role), role, cached, total })
            .collect::<Vec<_>>();

        for report in &stores {
            tracing::info!(store = %report.store, "precached {}/{} assets", report.cached, report.total);
        }

        Ok(InstallReport { stores })
    }

    /// Delete every store of this namespace that is not part of the current
    /// generation, then make sure the current stores exist.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let stale: Vec<String> = self
            .storage
            .list_store_names()
            .await?
            .into_iter()
            .filter(|name| self.names.is_stale(name))
            .collect();

        let mut tasks = JoinSet::new();
        for name in stale {
            let storage = Arc::clone(&self.storage);
            tasks.spawn(async move {
                let result = storage.delete_store(&name).await;
                (name, result)
            });
        }

        let mut deleted = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(_))) => deleted.push(name),
                Ok((name, Err(e))) => tracing::warn!(store = %name, error = %e, "failed to delete stale store"),
                Err(e) => tracing::warn!(error = %e, "stale store deletion task aborted"),
            }
        }
        deleted.sort();

        let retained = self.names.all();
        for name in &retained {
            self.storage.open(name).await?;
        }

        tracing::info!(version = %self.names.version(), deleted = deleted.len(), "activated");

        Ok(ActivationReport { deleted, retained })
    }

    /// Remove expired entries from one store. Returns the number removed.
    pub async fn purge_expired(&self, role: StoreRole) -> Result<usize, Error> {
        let store = NamedStore::new(self.names.name(role));
        let now = Utc::now();
        let mut purged = 0;
        for key in self.storage.list_keys(&store).await? {
            let expired = match self.storage.get(&store, &key).await? {
                Some(entry) => entry.is_expired_at(self.policy.max_age, now),
                None => false,
            };
            if expired && self.storage.delete_entry(&store, &key).await? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Remove every entry from one store, keeping the store itself.
    pub async fn clear(&self, role: StoreRole) -> Result<usize, Error> {
        let name = self.names.name(role);
        let count = self.storage.list_keys(&NamedStore::new(name.clone())).await?.len();
        self.storage.delete_store(&name).await?;
        self.storage.open(&name).await?;
        Ok(count)
    }

    /// Entry count of every current store.
    pub async fn entry_counts(&self) -> Result<Vec<(String, usize)>, Error> {
        let mut counts = Vec::new();
        for name in self.names.all() {
            let keys = self.storage.list_keys(&NamedStore::new(name.clone())).await?;
            counts.push((name, keys.len()));
        }
        Ok(counts)
    }
}

async fn precache(
    storage: &dyn CacheStorage, transport: &dyn Transport, store: &NamedStore, entry: &ManifestEntry,
    origin: Option<&Url>, timeout: std::time::Duration,
) -> Result<(), Error> {
    let url = resolve(&entry.url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let response = fetch_with_timeout(transport, &url, timeout).await?;
    if !response.is_ok() {
        return Err(Error::HttpError(format!("status {}", response.status)));
    }
    storage.put(store, url.as_str(), &response.stamped(Utc::now())).await
}
