//! Store inspection and maintenance tools.

pub mod purge;
pub mod status;

pub use purge::{CachePurgeParams, purge_impl};
pub use status::status_impl;
