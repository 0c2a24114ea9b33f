//! Client side of stash.
//!
//! This crate provides the network transport, request classification, the
//! per-category fetch strategies and the store lifecycle, assembled into the
//! [`OfflineCache`] layer that a host drives through its install, activate
//! and request hooks.

pub mod classify;
pub mod fetch;
pub mod layer;
pub mod lifecycle;
pub mod strategy;

pub use classify::{RequestCategory, RequestClassifier};
pub use fetch::{FetchConfig, HttpTransport, Transport, fetch_with_timeout};
pub use layer::{CacheStatus, Handled, OfflineCache, Phase, StoreStatus, fetch_config, open_storage};
pub use lifecycle::{ActivationReport, InstallReport, Lifecycle, StoreReport, enforce_max_entries};
pub use strategy::{Interception, ResponseSource, Served, Strategy, StrategyEngine};
