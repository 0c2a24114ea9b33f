//! Store registry: named, versioned key to response stores.
//!
//! This module defines the [`CacheStorage`] contract and provides two
//! implementations:
//!
//! - [`CacheDb`], persistent, SQLite with async access via tokio-rusqlite
//! - [`MemoryStorage`], in-process, for tests and ephemeral deployments
//!
//! Both guarantee that `put` is atomic per key and that `list_keys` reports
//! keys in insertion order. Re-putting a key moves it to the newest position.

pub mod connection;
pub mod entries;
pub mod memory;
pub mod migrations;
pub mod policy;
pub mod response;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStorage;
pub use policy::CachePolicy;
pub use response::StoredResponse;

/// Handle to an opened store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedStore {
    name: String,
}

impl NamedStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Contract shared by every store backend.
#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
    /// Open a store, creating it on first use. Idempotent.
    async fn open(&self, name: &str) -> Result<NamedStore, Error>;

    /// Look up an entry. Missing stores and missing keys both yield `None`.
    async fn get(&self, store: &NamedStore, key: &str) -> Result<Option<StoredResponse>, Error>;

    /// Insert or overwrite an entry.
    async fn put(&self, store: &NamedStore, key: &str, response: &StoredResponse) -> Result<(), Error>;

    /// Returns whether an entry was removed.
    async fn delete_entry(&self, store: &NamedStore, key: &str) -> Result<bool, Error>;

    /// Keys in insertion order, oldest first.
    async fn list_keys(&self, store: &NamedStore) -> Result<Vec<String>, Error>;

    /// Delete the oldest entries until at most `max_entries` remain, in one
    /// atomic step against concurrent puts. Returns the number removed.
    async fn evict_oldest(&self, store: &NamedStore, max_entries: usize) -> Result<usize, Error>;

    /// Returns whether the store existed.
    async fn delete_store(&self, name: &str) -> Result<bool, Error>;

    /// Names of all stores, sorted.
    async fn list_store_names(&self) -> Result<Vec<String>, Error>;
}
