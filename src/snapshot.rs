//! Last good copy of server API data, kept for offline viewing.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheSource, ShellRequest};
use crate::kv::KeyValueStore;
use crate::worker::WorkerHandle;

/// Network-first fetch of JSON endpoints through the shell worker.
///
/// A successful response is parsed and stored under its key; when the
/// network fails or answers non-2xx, the stored copy is served instead with
/// [`CacheSource::Cache`].
pub struct Snapshots<S: KeyValueStore> {
  kv: Arc<S>,
}

impl<S: KeyValueStore> Snapshots<S> {
  pub fn new(kv: Arc<S>) -> Self {
    Self { kv }
  }

  pub async fn fetch<T>(&self, worker: &WorkerHandle, url: Url, key: &str) -> Result<(T, CacheSource)>
  where
    T: DeserializeOwned,
  {
    let failure = match worker.fetch(ShellRequest::get(url.clone())).await {
      Ok(result) if result.data.is_success() => {
        let value = serde_json::from_slice::<T>(&result.data.body)
          .map_err(|e| eyre!("Invalid response from {}: {}", url.path(), e))?;
        self.store(key, &result.data.text());
        return Ok((value, result.source));
      }
      Ok(result) => eyre!("{} returned status {}", url.path(), result.data.status),
      Err(e) => eyre!("{} unavailable: {}", url.path(), e),
    };

    match self.cached(key) {
      Some(value) => {
        debug!(key, error = %failure, "serving stored snapshot");
        Ok((value, CacheSource::Cache))
      }
      None => Err(failure),
    }
  }

  /// The stored copy under `key`, if any and still parseable.
  pub fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let raw = match self.kv.get(key) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key, error = %e, "failed to read snapshot");
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "stored snapshot is corrupt");
        None
      }
    }
  }

  fn store(&self, key: &str, body: &str) {
    if let Err(e) = self.kv.set(key, body) {
      warn!(key, error = %e, "failed to store snapshot");
    }
  }
}
