use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::traits::{CachedResponse, ShellRequest};

/// The request never produced a response.
#[derive(Debug, Clone, Error)]
#[error("network error: {0}")]
pub struct NetworkError(pub String);

/// Network access from the worker.
pub trait Network: Send + Sync {
  fn fetch(
    &self,
    request: &ShellRequest,
  ) -> impl Future<Output = Result<CachedResponse, NetworkError>> + Send;
}

/// reqwest-backed network; follows redirects like a browser fetch.
pub struct HttpNetwork {
  client: reqwest::Client,
}

impl HttpNetwork {
  pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("billable-shell/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| NetworkError(e.to_string()))?;
    Ok(Self { client })
  }
}

impl Network for HttpNetwork {
  async fn fetch(&self, request: &ShellRequest) -> Result<CachedResponse, NetworkError> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
      .map_err(|e| NetworkError(e.to_string()))?;

    let response = self
      .client
      .request(method, request.url.clone())
      .send()
      .await
      .map_err(|e| NetworkError(e.to_string()))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response
      .bytes()
      .await
      .map_err(|e| NetworkError(e.to_string()))?
      .to_vec();

    Ok(CachedResponse {
      status,
      content_type,
      body,
    })
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Mutex;

  /// In-memory network keyed by path; can be switched off.
  #[derive(Default)]
  pub(crate) struct FakeNetwork {
    pages: Mutex<HashMap<String, CachedResponse>>,
    offline: AtomicBool,
    pub(crate) requests: Mutex<Vec<String>>,
  }

  impl FakeNetwork {
    pub(crate) fn serving(pages: &[(&str, &str)]) -> Self {
      let network = Self::default();
      for (path, body) in pages {
        network.set_page(path, 200, body);
      }
      network
    }

    pub(crate) fn set_page(&self, path: &str, status: u16, body: &str) {
      self.pages.lock().unwrap().insert(
        path.to_string(),
        CachedResponse {
          status,
          content_type: Some("text/html".to_string()),
          body: body.as_bytes().to_vec(),
        },
      );
    }

    pub(crate) fn set_offline(&self, offline: bool) {
      self.offline.store(offline, Ordering::SeqCst);
    }
  }

  impl Network for FakeNetwork {
    async fn fetch(&self, request: &ShellRequest) -> Result<CachedResponse, NetworkError> {
      let path = request.url.path().to_string();
      self.requests.lock().unwrap().push(path.clone());
      if self.offline.load(Ordering::SeqCst) {
        return Err(NetworkError("offline".to_string()));
      }
      Ok(self.pages.lock().unwrap().get(&path).cloned().unwrap_or(CachedResponse {
        status: 404,
        content_type: None,
        body: Vec::new(),
      }))
    }
  }
}
