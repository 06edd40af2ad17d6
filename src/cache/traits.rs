//! Core types for the shell cache.

use sha2::{Digest, Sha256};
use url::Url;

/// A request as seen by the intercept layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
  pub method: String,
  pub url: Url,
  /// Full document navigation (as opposed to an asset or API call)
  pub navigation: bool,
}

impl ShellRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
      navigation: false,
    }
  }

  pub fn navigate(url: Url) -> Self {
    Self {
      navigation: true,
      ..Self::get(url)
    }
  }

  /// Exact-request identity: method plus absolute URL.
  pub fn cache_key(&self) -> String {
    format!("{} {}", self.method.to_uppercase(), self.url)
  }

  /// SHA256 of the cache key, for stable fixed-length storage keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.cache_key().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A stored or freshly fetched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl CachedResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

/// Result of an intercepted fetch, including where the response came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn offline(data: T) -> Self {
    Self {
      data,
      source: CacheSource::OfflineFallback,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Exact match in a cache bucket
  Cache,
  /// Forwarded to the network
  Network,
  /// Cache and network both missed; the cached root document was served
  OfflineFallback,
}
