use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::{
  cache_name, LifecycleState, PageMessage, WorkerError, WorkerEvent, WorkerHandle, SHELL_ASSETS,
  SYNC_TAG,
};
use crate::cache::{CacheLayer, CacheResult, CacheStorage, CachedResponse, Network, ShellRequest};

pub struct ShellWorker<S: CacheStorage, N: Network> {
  layer: CacheLayer<S, N>,
  base: Url,
  state: LifecycleState,
  registrations: BTreeSet<String>,
  page: mpsc::UnboundedSender<PageMessage>,
}

impl<S, N> ShellWorker<S, N>
where
  S: CacheStorage + 'static,
  N: Network + 'static,
{
  /// Start the worker task. A worker whose current bucket already exists
  /// starts out activated, as a previously installed worker would.
  pub fn spawn(
    storage: Arc<S>,
    network: Arc<N>,
    base: Url,
  ) -> (WorkerHandle, mpsc::UnboundedReceiver<PageMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (page, page_rx) = mpsc::unbounded_channel();

    let state = match storage.bucket_names() {
      Ok(names) if names.contains(&cache_name()) => LifecycleState::Activated,
      Ok(_) => LifecycleState::Parsed,
      Err(e) => {
        warn!(error = %e, "failed to read shell buckets");
        LifecycleState::Parsed
      }
    };
    debug!(?state, "shell worker starting");

    let worker = Self {
      layer: CacheLayer::new(storage, network),
      base,
      state,
      registrations: BTreeSet::new(),
      page,
    };
    tokio::spawn(worker.run(rx));

    (WorkerHandle { tx }, page_rx)
  }

  async fn run(mut self, mut events: mpsc::UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
      match event {
        WorkerEvent::Install { reply } => {
          let _ = reply.send(self.install().await);
        }
        WorkerEvent::Activate { reply } => {
          let _ = reply.send(self.activate());
        }
        WorkerEvent::Fetch { request, reply } => {
          let _ = reply.send(self.fetch(&request).await);
        }
        WorkerEvent::RegisterSync { tag } => {
          debug!(%tag, "sync registered");
          self.registrations.insert(tag);
        }
        WorkerEvent::Sync { tag } => self.fire(&tag),
        WorkerEvent::State { reply } => {
          let _ = reply.send(self.state);
        }
        WorkerEvent::Buckets { reply } => {
          let names = self
            .layer
            .storage()
            .bucket_names()
            .map_err(|e| WorkerError::Storage(e.to_string()));
          let _ = reply.send(names);
        }
        WorkerEvent::PendingSyncs { reply } => {
          let _ = reply.send(self.registrations.iter().cloned().collect());
        }
      }
    }
    debug!("shell worker stopped");
  }

  /// Fetch every shell asset; store them only if all succeed. Skips waiting.
  async fn install(&mut self) -> Result<(), WorkerError> {
    self.state = LifecycleState::Installing;
    info!(cache = %cache_name(), "installing shell");

    match self.precache().await {
      Ok(count) => {
        self.state = LifecycleState::Installed;
        info!(assets = count, "shell installed");
      }
      Err(e) => {
        self.state = LifecycleState::Redundant;
        warn!(error = %e, "shell install failed");
        return Err(e);
      }
    }

    self.activate().map(|_| ())
  }

  async fn precache(&self) -> Result<usize, WorkerError> {
    let requests = SHELL_ASSETS
      .iter()
      .map(|path| {
        self
          .base
          .join(path)
          .map(ShellRequest::get)
          .map_err(|e| WorkerError::InstallFailed {
            url: path.to_string(),
            reason: e.to_string(),
          })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let network = self.layer.network();
    let responses = try_join_all(requests.into_iter().map(|request| async move {
      let response = network
        .fetch(&request)
        .await
        .map_err(|e| WorkerError::InstallFailed {
          url: request.url.to_string(),
          reason: e.to_string(),
        })?;
      if !response.is_success() {
        return Err(WorkerError::InstallFailed {
          url: request.url.to_string(),
          reason: format!("status {}", response.status),
        });
      }
      Ok((request, response))
    }))
    .await?;

    self
      .layer
      .storage()
      .put_all(&cache_name(), &responses)
      .map_err(|e| WorkerError::Storage(e.to_string()))?;

    Ok(responses.len())
  }

  fn activate(&mut self) -> Result<Vec<String>, WorkerError> {
    let previous = self.state;
    self.state = LifecycleState::Activating;

    match self.delete_stale_buckets() {
      Ok(deleted) => {
        self.state = LifecycleState::Activated;
        info!(stale = deleted.len(), "shell activated");
        Ok(deleted)
      }
      Err(e) => {
        self.state = previous;
        Err(e)
      }
    }
  }

  fn delete_stale_buckets(&self) -> Result<Vec<String>, WorkerError> {
    let storage = self.layer.storage();
    let current = cache_name();
    let names = storage
      .bucket_names()
      .map_err(|e| WorkerError::Storage(e.to_string()))?;

    let mut deleted = Vec::new();
    for name in names.into_iter().filter(|name| *name != current) {
      storage
        .delete_bucket(&name)
        .map_err(|e| WorkerError::Storage(e.to_string()))?;
      info!(bucket = %name, "deleted stale shell cache");
      deleted.push(name);
    }
    Ok(deleted)
  }

  async fn fetch(
    &self,
    request: &ShellRequest,
  ) -> Result<CacheResult<CachedResponse>, WorkerError> {
    if self.state != LifecycleState::Activated {
      let response = self.layer.network().fetch(request).await?;
      return Ok(CacheResult::from_network(response));
    }

    self
      .layer
      .fetch(request)
      .await
      .map_err(|e| WorkerError::Fetch(e.to_string()))
  }

  fn fire(&mut self, tag: &str) {
    if !self.registrations.contains(tag) {
      debug!(%tag, "sync fired for unregistered tag");
      return;
    }

    if tag != SYNC_TAG {
      debug!(%tag, "no handler for sync tag");
      self.registrations.remove(tag);
      return;
    }

    match self.page.send(PageMessage::DrainRequested) {
      Ok(()) => {
        debug!(%tag, "drain requested");
        self.registrations.remove(tag);
      }
      Err(_) => warn!(%tag, "no page listening, sync stays registered"),
    }
  }
}
