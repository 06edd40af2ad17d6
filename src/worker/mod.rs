//! The shell worker: an isolated task that pre-caches the application shell
//! and relays background-sync wake-ups to the page side.
//!
//! The page side never touches the worker's state. It holds a
//! [`WorkerHandle`] that sends [`WorkerEvent`]s in, and receives
//! [`PageMessage`]s back on a separate channel.

mod shell;

pub use shell::ShellWorker;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::cache::{CacheResult, CachedResponse, NetworkError, ShellRequest};

/// Bump to invalidate every previously cached shell.
pub const CACHE_VERSION: &str = "v1";

/// Tag registered by the page whenever it queues an entry.
pub const SYNC_TAG: &str = "sync-entries";

/// Documents and assets fetched at install time.
pub const SHELL_ASSETS: &[&str] = &["/", "/timer", "/dashboard", "/manifest.json"];

pub fn cache_name() -> String {
  format!("billable-shell-{}", CACHE_VERSION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  /// Spawned, nothing installed yet
  Parsed,
  Installing,
  Installed,
  Activating,
  /// Serving fetches from the cache
  Activated,
  /// Install failed; fetches go straight to the network
  Redundant,
}

#[derive(Debug, Error)]
pub enum WorkerError {
  #[error("shell install failed on {url}: {reason}")]
  InstallFailed { url: String, reason: String },
  #[error("cache storage: {0}")]
  Storage(String),
  #[error(transparent)]
  Network(#[from] NetworkError),
  #[error("fetch failed: {0}")]
  Fetch(String),
  #[error("shell worker is not running")]
  Closed,
}

pub type Reply<T> = oneshot::Sender<Result<T, WorkerError>>;

/// Events delivered to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
  Install {
    reply: Reply<()>,
  },
  Activate {
    reply: Reply<Vec<String>>,
  },
  Fetch {
    request: ShellRequest,
    reply: Reply<CacheResult<CachedResponse>>,
  },
  RegisterSync {
    tag: String,
  },
  /// The environment fired a sync tag
  Sync {
    tag: String,
  },
  State {
    reply: oneshot::Sender<LifecycleState>,
  },
  Buckets {
    reply: Reply<Vec<String>>,
  },
  PendingSyncs {
    reply: oneshot::Sender<Vec<String>>,
  },
}

/// Messages posted from the worker to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMessage {
  DrainRequested,
}

/// Page-side handle to a running shell worker.
#[derive(Clone)]
pub struct WorkerHandle {
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
  fn send(&self, event: WorkerEvent) -> Result<(), WorkerError> {
    self.tx.send(event).map_err(|_| WorkerError::Closed)
  }

  async fn call<T>(
    &self,
    make: impl FnOnce(Reply<T>) -> WorkerEvent,
  ) -> Result<T, WorkerError> {
    let (reply, rx) = oneshot::channel();
    self.send(make(reply))?;
    rx.await.map_err(|_| WorkerError::Closed)?
  }

  /// Install the shell, then activate it.
  pub async fn install(&self) -> Result<(), WorkerError> {
    self.call(|reply| WorkerEvent::Install { reply }).await
  }

  /// Delete every bucket but the current one; returns the deleted names.
  pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
    self.call(|reply| WorkerEvent::Activate { reply }).await
  }

  pub async fn fetch(
    &self,
    request: ShellRequest,
  ) -> Result<CacheResult<CachedResponse>, WorkerError> {
    self
      .call(|reply| WorkerEvent::Fetch { request, reply })
      .await
  }

  pub fn register_sync(&self, tag: &str) -> Result<(), WorkerError> {
    self.send(WorkerEvent::RegisterSync {
      tag: tag.to_string(),
    })
  }

  pub fn fire_sync(&self, tag: &str) -> Result<(), WorkerError> {
    self.send(WorkerEvent::Sync {
      tag: tag.to_string(),
    })
  }

  pub async fn state(&self) -> Result<LifecycleState, WorkerError> {
    let (reply, rx) = oneshot::channel();
    self.send(WorkerEvent::State { reply })?;
    rx.await.map_err(|_| WorkerError::Closed)
  }

  pub async fn buckets(&self) -> Result<Vec<String>, WorkerError> {
    self.call(|reply| WorkerEvent::Buckets { reply }).await
  }

  /// Sync tags registered but not yet delivered to a page.
  pub async fn pending_syncs(&self) -> Result<Vec<String>, WorkerError> {
    let (reply, rx) = oneshot::channel();
    self.send(WorkerEvent::PendingSyncs { reply })?;
    rx.await.map_err(|_| WorkerError::Closed)
  }
}
