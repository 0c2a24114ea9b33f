//! The intercepting cache layer as seen by its host.
//!
//! [`OfflineCache`] wires classifier, strategy engine and lifecycle manager
//! to one injected store registry and transport, and exposes the three
//! runtime hooks: install, activate and the per-request hook.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_core::{
    AppConfig, AssetManifest, CacheDb, CachePolicy, CacheStorage, Error, MemoryStorage, StorageBackend, StoreNames,
    StoreRole, StoredResponse,
};
use tokio::sync::RwLock;
use url::Url;

use crate::classify::{RequestCategory, RequestClassifier};
use crate::fetch::{FetchConfig, HttpTransport, Transport, resolve};
use crate::lifecycle::{ActivationReport, InstallReport, Lifecycle};
use crate::strategy::{Interception, ResponseSource, StrategyEngine};

/// Where the layer is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Pending,
    Installing,
    Installed,
    Active,
}

/// Response handed back to the host for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    pub url: Url,
    pub category: RequestCategory,
    /// `None` when the request bypassed the cache layer.
    pub source: Option<ResponseSource>,
    pub response: StoredResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoreStatus {
    pub store: String,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatus {
    pub version: String,
    pub phase: Phase,
    pub stores: Vec<StoreStatus>,
    pub checked_at: DateTime<Utc>,
}

/// Transport settings for `config`. The client-level timeout follows the
/// network race timeout so neither cuts the other short.
pub fn fetch_config(config: &AppConfig) -> FetchConfig {
    FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.network_timeout(),
        ..Default::default()
    }
}

/// Open the store backend selected by the configuration.
pub async fn open_storage(config: &AppConfig) -> Result<Arc<dyn CacheStorage>, Error> {
    match config.storage {
        StorageBackend::Sqlite => {
            tracing::info!(path = %config.db_path.display(), "opening SQLite store registry");
            Ok(Arc::new(CacheDb::open(&config.db_path).await?))
        }
        StorageBackend::Memory => {
            tracing::info!("using in-memory store registry");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

pub struct OfflineCache {
    classifier: RequestClassifier,
    engine: StrategyEngine,
    lifecycle: Lifecycle,
    transport: Arc<dyn Transport>,
    phase: RwLock<Phase>,
}

impl OfflineCache {
    pub fn new(
        storage: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>, names: StoreNames, policy: CachePolicy,
        origin: Option<Url>,
    ) -> Self {
        let engine = StrategyEngine::new(Arc::clone(&storage), Arc::clone(&transport), names.clone(), policy);
        let lifecycle = Lifecycle::new(storage, Arc::clone(&transport), names, policy, origin.clone());
        Self {
            classifier: RequestClassifier::new(origin),
            engine,
            lifecycle,
            transport,
            phase: RwLock::new(Phase::Pending),
        }
    }

    /// Build the layer with the reqwest transport described by `config`.
    pub fn from_config(config: &AppConfig, storage: Arc<dyn CacheStorage>) -> Result<Self, Error> {
        let origin = config
            .origin
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let transport = HttpTransport::new(fetch_config(config))?;

        Ok(Self::new(storage, Arc::new(transport), config.store_names(), config.policy(), origin))
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    /// Install hook: precache the manifest into the current stores.
    pub async fn install(&self, manifest: &AssetManifest) -> Result<InstallReport, Error> {
        *self.phase.write().await = Phase::Installing;
        match self.lifecycle.install(manifest).await {
            Ok(report) => {
                *self.phase.write().await = Phase::Installed;
                tracing::info!(cached = report.cached(), total = report.total(), "install complete");
                Ok(report)
            }
            Err(e) => {
                *self.phase.write().await = Phase::Pending;
                Err(e)
            }
        }
    }

    /// Activate hook: drop previous generations, then start claiming requests.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` unless install has completed.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let phase = self.phase().await;
        if !matches!(phase, Phase::Installed | Phase::Active) {
            return Err(Error::InvalidInput(format!("cannot activate while {phase:?}, install first")));
        }

        let report = self.lifecycle.activate().await?;
        *self.phase.write().await = Phase::Active;
        Ok(report)
    }

    /// Request hook. Returns [`Interception::Bypass`] when the host must
    /// send the request to the network itself, which includes every request
    /// made before activation has completed.
    pub async fn intercept(&self, url: &str) -> Result<(Url, RequestCategory, Interception), Error> {
        let resolved = resolve(url, self.classifier.origin()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let category = self.classifier.classify_url(&resolved);
        if self.phase().await != Phase::Active {
            tracing::debug!(url = %resolved, "not active yet, passing request through");
            return Ok((resolved, category, Interception::Bypass));
        }
        let outcome = self.engine.execute(category, &resolved).await;
        Ok((resolved, category, outcome))
    }

    /// Request hook plus the host's side of a bypass: bypassed requests go
    /// straight to the transport without a timeout race or store access.
    pub async fn fetch(&self, url: &str) -> Result<Handled, Error> {
        let (url, category, outcome) = self.intercept(url).await?;
        match outcome {
            Interception::Respond(served) => {
                Ok(Handled { url, category, source: Some(served.source), response: served.response })
            }
            Interception::Bypass => {
                let response = self.transport.fetch(&url).await?;
                Ok(Handled { url, category, source: None, response })
            }
        }
    }

    pub async fn status(&self) -> Result<CacheStatus, Error> {
        let stores = self
            .lifecycle
            .entry_counts()
            .await?
            .into_iter()
            .map(|(store, entries)| StoreStatus { store, entries })
            .collect();

        Ok(CacheStatus {
            version: self.lifecycle.names().version().to_string(),
            phase: self.phase().await,
            stores,
            checked_at: Utc::now(),
        })
    }

    /// Purge one store, or all three when `role` is `None`. With
    /// `expired_only` unset every entry is removed.
    pub async fn purge(&self, role: Option<StoreRole>, expired_only: bool) -> Result<usize, Error> {
        let roles = match role {
            Some(role) => vec![role],
            None => StoreRole::ALL.to_vec(),
        };

        let mut purged = 0;
        for role in roles {
            purged += if expired_only {
                self.lifecycle.purge_expired(role).await?
            } else {
                self.lifecycle.clear(role).await?
            };
        }
        Ok(purged)
    }

    /// Wait for background eviction to finish.
    pub async fn shutdown(&self) {
        self.engine.drain_evictions().await;
    }
}
