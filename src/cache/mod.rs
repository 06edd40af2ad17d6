//! Versioned response cache behind the shell worker.
//!
//! This module provides:
//! - Named buckets of cached responses, keyed by exact request (method + URL)
//! - A cache-first fetch strategy with network fallthrough
//! - An offline page for document navigations when both cache and network miss

mod layer;
mod network;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use network::{HttpNetwork, Network, NetworkError};
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, CachedResponse, ShellRequest};

#[cfg(test)]
pub(crate) use network::tests::FakeNetwork;
