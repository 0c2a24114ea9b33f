//! Core types and shared functionality for stash.
//!
//! This crate provides:
//! - The store registry contract with SQLite and in-memory backends
//! - Stored responses, cache versions and store naming
//! - The build-time asset manifest
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod version;

pub use cache::{CacheDb, CachePolicy, CacheStorage, MemoryStorage, NamedStore, StoredResponse};
pub use config::{AppConfig, ConfigError, StorageBackend};
pub use error::Error;
pub use manifest::{AssetManifest, AssetRole, ManifestEntry};
pub use version::{CacheVersion, StoreNames, StoreRole};
