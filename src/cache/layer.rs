//! Cache-first fetch over the shell buckets.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use super::network::{Network, NetworkError};
use super::storage::CacheStorage;
use super::traits::{CacheResult, CachedResponse, ShellRequest};

/// Sits between intercepted requests and the network.
///
/// 1. Exact match in any bucket is returned as-is
/// 2. Otherwise the request goes to the network, uncached
/// 3. A document navigation that fails on the network gets the cached root
pub struct CacheLayer<S: CacheStorage, N: Network> {
  storage: Arc<S>,
  network: Arc<N>,
}

impl<S: CacheStorage, N: Network> CacheLayer<S, N> {
  pub fn new(storage: Arc<S>, network: Arc<N>) -> Self {
    Self { storage, network }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  pub fn network(&self) -> &N {
    &self.network
  }

  pub async fn fetch(&self, request: &ShellRequest) -> Result<CacheResult<CachedResponse>> {
    match self.storage.match_request(request) {
      Ok(Some(hit)) => {
        debug!(key = %request.cache_key(), "cache hit");
        return Ok(CacheResult::from_cache(hit));
      }
      Ok(None) => {}
      Err(e) => warn!(error = %e, "cache lookup failed, going to network"),
    }

    match self.network.fetch(request).await {
      Ok(response) => Ok(CacheResult::from_network(response)),
      Err(e) if request.navigation => self.offline_root(request, e),
      Err(e) => Err(e.into()),
    }
  }

  fn offline_root(
    &self,
    request: &ShellRequest,
    err: NetworkError,
  ) -> Result<CacheResult<CachedResponse>> {
    let mut root = request.url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);

    match self.storage.match_request(&ShellRequest::get(root))? {
      Some(page) => {
        debug!(key = %request.cache_key(), "offline, serving cached root");
        Ok(CacheResult::offline(page))
      }
      None => Err(err.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::network::tests::FakeNetwork;
  use crate::cache::storage::SqliteStorage;
  use crate::cache::CacheSource;
  use crate::db::Database;
  use url::Url;

  fn request(path: &str) -> ShellRequest {
    ShellRequest::get(Url::parse("http://h").unwrap().join(path).unwrap())
  }

  fn layer(network: FakeNetwork) -> CacheLayer<SqliteStorage, FakeNetwork> {
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    CacheLayer::new(Arc::new(storage), Arc::new(network))
  }

  fn cache_root(layer: &CacheLayer<SqliteStorage, FakeNetwork>) {
    let root = CachedResponse {
      status: 200,
      content_type: Some("text/html".to_string()),
      body: b"shell".to_vec(),
    };
    layer.storage().put_all("shell-v1", &[(request("/"), root)]).unwrap();
  }

  #[tokio::test]
  async fn test_cache_hit_skips_network() {
    let layer = layer(FakeNetwork::serving(&[("/", "fresh")]));
    cache_root(&layer);

    let result = layer.fetch(&request("/")).await.unwrap();
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.data.text(), "shell");
    assert!(layer.network().requests.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_miss_goes_to_network_without_caching() {
    let layer = layer(FakeNetwork::serving(&[("/entries", "list")]));

    let result = layer.fetch(&request("/entries")).await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert!(layer.storage().match_request(&request("/entries")).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_offline_navigation_serves_root() {
    let layer = layer(FakeNetwork::default());
    cache_root(&layer);
    layer.network().set_offline(true);

    let nav = ShellRequest::navigate(Url::parse("http://h/entries?mode=30d").unwrap());
    let result = layer.fetch(&nav).await.unwrap();
    assert_eq!(result.source, CacheSource::OfflineFallback);
    assert_eq!(result.data.text(), "shell");
  }

  #[tokio::test]
  async fn test_offline_asset_fails() {
    let layer = layer(FakeNetwork::default());
    cache_root(&layer);
    layer.network().set_offline(true);

    assert!(layer.fetch(&request("/static/app.js")).await.is_err());
  }

  #[tokio::test]
  async fn test_offline_navigation_without_root_fails() {
    let layer = layer(FakeNetwork::default());
    layer.network().set_offline(true);

    let nav = ShellRequest::navigate(Url::parse("http://h/entries").unwrap());
    assert!(layer.fetch(&nav).await.is_err());
  }
}
