//! In-memory store backend.
//!
//! Same contract as [`CacheDb`](super::CacheDb) without persistence. Stores
//! and their entries live in `DashMap`s, so puts to different keys only
//! contend on the map shard they hash to. Insertion order is tracked by a
//! per-store sequence number stamped on every put.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheStorage, NamedStore, StoredResponse};
use crate::Error;

#[derive(Debug, Default)]
struct Shard {
    next_seq: AtomicU64,
    entries: DashMap<String, (u64, StoredResponse)>,
}

impl Shard {
    /// `(seq, key)` pairs, oldest first.
    fn ordered(&self) -> Vec<(u64, String)> {
        let mut keys: Vec<(u64, String)> = self.entries.iter().map(|e| (e.value().0, e.key().clone())).collect();
        keys.sort_unstable();
        keys
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    stores: Arc<DashMap<String, Arc<Shard>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, name: &str) -> Option<Arc<Shard>> {
        self.stores.get(name).map(|shard| Arc::clone(shard.value()))
    }

    fn shard_or_create(&self, name: &str) -> Arc<Shard> {
        Arc::clone(self.stores.entry(name.to_string()).or_default().value())
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<NamedStore, Error> {
        self.shard_or_create(name);
        Ok(NamedStore::new(name))
    }

    async fn get(&self, store: &NamedStore, key: &str) -> Result<Option<StoredResponse>, Error> {
        Ok(self
            .shard(store.name())
            .and_then(|shard| shard.entries.get(key).map(|entry| entry.value().1.clone())))
    }

    async fn put(&self, store: &NamedStore, key: &str, response: &StoredResponse) -> Result<(), Error> {
        let shard = self.shard_or_create(store.name());
        let seq = shard.next_seq.fetch_add(1, Ordering::SeqCst);
        shard.entries.insert(key.to_string(), (seq, response.clone()));
        Ok(())
    }

    async fn delete_entry(&self, store: &NamedStore, key: &str) -> Result<bool, Error> {
        Ok(self
            .shard(store.name())
            .is_some_and(|shard| shard.entries.remove(key).is_some()))
    }

    async fn list_keys(&self, store: &NamedStore) -> Result<Vec<String>, Error> {
        Ok(self
            .shard(store.name())
            .map(|shard| shard.ordered().into_iter().map(|(_, key)| key).collect())
            .unwrap_or_default())
    }

    async fn evict_oldest(&self, store: &NamedStore, max_entries: usize) -> Result<usize, Error> {
        let Some(shard) = self.shard(store.name()) else {
            return Ok(0);
        };
        let ordered = shard.ordered();
        let excess = ordered.len().saturating_sub(max_entries);

        // A key re-put since the snapshot carries a newer seq and is kept.
        let evicted = ordered
            .into_iter()
            .take(excess)
            .filter(|(seq, key)| shard.entries.remove_if(key, |_, (current, _)| current == seq).is_some())
            .count();
        Ok(evicted)
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.remove(name).is_some())
    }

    async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = self.stores.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
