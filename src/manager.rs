//! Entry point for the page side: submission, draining and connectivity hooks.

use chrono::Local;
use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connectivity::{ConnectivityListener, ConnectivityMonitor};
use crate::draft::DraftStore;
use crate::kv::KeyValueStore;
use crate::notify::{Notifier, ToastKind};
use crate::queue::{EntryForm, PendingEntry, QueueStore};
use crate::remote::{RemoteEndpoint, SaveOutcome, SavePayload};
use crate::sync::{DrainReport, SyncEngine};
use crate::worker::{WorkerHandle, SYNC_TAG};

/// What asked for a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
  Startup,
  Online,
  BackgroundSync,
  Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueReason {
  Offline,
  Rejected { status: u16 },
  Unreachable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
  Saved { redirect: Option<String> },
  Queued { entry: PendingEntry, reason: QueueReason },
}

pub struct OfflineManager<S, R, N>
where
  S: KeyValueStore,
  R: RemoteEndpoint,
  N: Notifier,
{
  queue: Arc<QueueStore<S>>,
  drafts: DraftStore<S>,
  remote: Arc<R>,
  notifier: Arc<N>,
  connectivity: Arc<ConnectivityMonitor>,
  engine: SyncEngine<S, R, N>,
  worker: Option<WorkerHandle>,
  default_timekeeper: Option<String>,
}

impl<S, R, N> OfflineManager<S, R, N>
where
  S: KeyValueStore,
  R: RemoteEndpoint,
  N: Notifier,
{
  pub fn new(
    kv: Arc<S>,
    remote: Arc<R>,
    notifier: Arc<N>,
    connectivity: Arc<ConnectivityMonitor>,
    config: &Config,
  ) -> Self {
    let queue = Arc::new(QueueStore::new(kv.clone()));
    let engine = SyncEngine::new(
      queue.clone(),
      remote.clone(),
      notifier.clone(),
      config.reload_delay(),
    );

    Self {
      queue,
      drafts: DraftStore::new(kv),
      remote,
      notifier,
      connectivity,
      engine,
      worker: None,
      default_timekeeper: config.timekeeper.clone(),
    }
  }

  /// Register background sync with this worker whenever an entry is queued.
  pub fn with_worker(mut self, worker: WorkerHandle) -> Self {
    self.worker = Some(worker);
    self
  }

  /// Validate and send a form, queueing it when the server cannot take it now.
  ///
  /// A form that fails validation is returned as an error and the draft is
  /// left alone. Saved and queued forms both clear the draft.
  pub async fn submit(&self, form: &EntryForm) -> Result<SubmitOutcome> {
    let entry = PendingEntry::from_form(
      form,
      self.default_timekeeper.as_deref(),
      Local::now().date_naive(),
    )?;

    if !self.connectivity.is_online() {
      return self.enqueue(entry, QueueReason::Offline);
    }

    match self.remote.save(&SavePayload::from(&entry)).await {
      Ok(SaveOutcome::Accepted { redirect }) => {
        info!(client = %entry.client, hours = %entry.hours, "entry saved");
        self.discard_draft();
        self.notifier.toast(ToastKind::Success, "Entry saved");
        Ok(SubmitOutcome::Saved { redirect })
      }
      Ok(SaveOutcome::Rejected { status }) => {
        warn!(status, "save rejected, queueing entry");
        self.enqueue(entry, QueueReason::Rejected { status })
      }
      Err(e) => {
        warn!(error = %e, "save failed, queueing entry");
        self.enqueue(entry, QueueReason::Unreachable)
      }
    }
  }

  fn enqueue(&self, entry: PendingEntry, reason: QueueReason) -> Result<SubmitOutcome> {
    let entry = self.queue.append(entry)?;
    info!(id = %entry.id, ?reason, "entry queued");

    if let Some(worker) = &self.worker {
      if let Err(e) = worker.register_sync(SYNC_TAG) {
        debug!(error = %e, "background sync not registered");
      }
    }

    self.discard_draft();
    let (kind, message) = match reason {
      QueueReason::Offline => (
        ToastKind::Info,
        "Saved offline. Will sync when connection returns.",
      ),
      _ => (
        ToastKind::Warning,
        "Server did not accept the entry. Saved offline for retry.",
      ),
    };
    self.notifier.toast(kind, message);

    Ok(SubmitOutcome::Queued { entry, reason })
  }

  fn discard_draft(&self) {
    if let Err(e) = self.drafts.clear() {
      warn!(error = %e, "failed to clear entry draft");
    }
  }

  pub async fn drain(&self, trigger: DrainTrigger) -> Result<DrainReport> {
    debug!(?trigger, "drain requested");
    self.engine.drain().await
  }

  pub fn save_draft(&self, form: &EntryForm) -> Result<()> {
    self.drafts.save(form)
  }

  pub fn draft(&self) -> Option<EntryForm> {
    self.drafts.load()
  }

  pub fn pending(&self) -> Vec<PendingEntry> {
    self.queue.load()
  }

  pub fn pending_count(&self) -> usize {
    self.engine.pending_count()
  }

  pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
    &self.connectivity
  }

  pub fn notifier(&self) -> &Arc<N> {
    &self.notifier
  }

  /// Listener that toggles the offline banner and asks for a drain on reconnect.
  pub fn listener(&self, drains: mpsc::UnboundedSender<DrainTrigger>) -> Arc<OfflineListener<N>> {
    Arc::new(OfflineListener {
      notifier: self.notifier.clone(),
      drains,
    })
  }
}

pub struct OfflineListener<N: Notifier> {
  notifier: Arc<N>,
  drains: mpsc::UnboundedSender<DrainTrigger>,
}

impl<N: Notifier> ConnectivityListener for OfflineListener<N> {
  fn on_online(&self) {
    self.notifier.hide_offline_banner();
    if self.drains.send(DrainTrigger::Online).is_err() {
      debug!("no drain runner, reconnect drain dropped");
    }
  }

  fn on_offline(&self) {
    self.notifier.show_offline_banner();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{FakeNetwork, SqliteStorage};
  use crate::connectivity::ConnectivityState::{Offline, Online};
  use crate::db::Database;
  use crate::kv::{BusyStore, MemoryStore};
  use crate::notify::tests::RecordingNotifier;
  use crate::queue::fixtures::form;
  use crate::remote::tests::{dropped, rejected, FakeEndpoint};
  use crate::worker::ShellWorker;

  type TestManager = OfflineManager<MemoryStore, FakeEndpoint, RecordingNotifier>;

  fn manager(remote: FakeEndpoint, online: bool) -> TestManager {
    let state = if online { Online } else { Offline };
    OfflineManager::new(
      Arc::new(MemoryStore::default()),
      Arc::new(remote),
      Arc::new(RecordingNotifier::default()),
      Arc::new(ConnectivityMonitor::new(state)),
      &Config::default(),
    )
  }

  #[tokio::test]
  async fn test_online_submit_saves_and_clears_draft() {
    let manager = manager(FakeEndpoint::accepting(), true);
    manager.save_draft(&form("Acme", "1.5")).unwrap();

    let outcome = manager.submit(&form("Acme", "1.5")).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Saved { redirect: None });
    assert_eq!(manager.pending_count(), 0);
    assert!(manager.draft().is_none());
    assert_eq!(manager.notifier().calls(), vec!["toast:Success:Entry saved"]);
  }

  #[tokio::test]
  async fn test_offline_submit_queues_without_request() {
    let manager = manager(FakeEndpoint::accepting(), false);

    let outcome = manager.submit(&form("Acme", "2")).await.unwrap();

    assert!(matches!(
      outcome,
      SubmitOutcome::Queued {
        reason: QueueReason::Offline,
        ..
      }
    ));
    assert_eq!(manager.pending_count(), 1);
    assert!(manager.remote.descriptions().is_empty());
    assert!(manager.notifier().calls()[0].starts_with("toast:Info:"));
  }

  #[tokio::test]
  async fn test_failed_online_submit_queues() {
    let manager = manager(FakeEndpoint::scripted([rejected(422), dropped()]), true);

    let first = manager.submit(&form("A", "1")).await.unwrap();
    let second = manager.submit(&form("B", "1")).await.unwrap();

    assert!(matches!(
      first,
      SubmitOutcome::Queued {
        reason: QueueReason::Rejected { status: 422 },
        ..
      }
    ));
    assert!(matches!(
      second,
      SubmitOutcome::Queued {
        reason: QueueReason::Unreachable,
        ..
      }
    ));
    let clients: Vec<_> = manager.pending().into_iter().map(|e| e.client).collect();
    assert_eq!(clients, vec!["A", "B"]);
  }

  #[tokio::test]
  async fn test_invalid_form_keeps_draft() {
    let manager = manager(FakeEndpoint::accepting(), true);
    let bad = form("Acme", "0");
    manager.save_draft(&bad).unwrap();

    assert!(manager.submit(&bad).await.is_err());
    assert_eq!(manager.pending_count(), 0);
    assert_eq!(manager.draft(), Some(bad));
  }

  #[tokio::test]
  async fn test_unreadable_queue_fails_submit_without_losing_entries() {
    let kv = Arc::new(BusyStore::default());
    let manager = OfflineManager::new(
      kv.clone(),
      Arc::new(FakeEndpoint::accepting()),
      Arc::new(RecordingNotifier::default()),
      Arc::new(ConnectivityMonitor::new(Offline)),
      &Config::default(),
    );
    manager.submit(&form("A", "1")).await.unwrap();
    manager.save_draft(&form("B", "1")).unwrap();

    kv.fail_next_read();
    assert!(manager.submit(&form("B", "1")).await.is_err());

    let clients: Vec<_> = manager.pending().into_iter().map(|e| e.client).collect();
    assert_eq!(clients, vec!["A"]);
    assert_eq!(manager.draft(), Some(form("B", "1")));
  }

  #[tokio::test]
  async fn test_queued_entry_drains_after_reconnect() {
    let manager = manager(FakeEndpoint::accepting(), false);
    manager.submit(&form("Acme", "1")).await.unwrap();

    manager.connectivity().signal(Online);
    let report = manager.drain(DrainTrigger::Online).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(manager.pending_count(), 0);
    assert_eq!(manager.remote.descriptions(), vec!["work for Acme"]);
  }

  #[tokio::test]
  async fn test_queueing_registers_background_sync() {
    let storage = Arc::new(SqliteStorage::new(Database::open_in_memory().unwrap()));
    let (worker, _page) = ShellWorker::spawn(
      storage,
      Arc::new(FakeNetwork::default()),
      url::Url::parse("http://h").unwrap(),
    );
    let manager = manager(FakeEndpoint::accepting(), false).with_worker(worker.clone());

    manager.submit(&form("Acme", "1")).await.unwrap();

    assert_eq!(worker.pending_syncs().await.unwrap(), vec![SYNC_TAG]);
  }

  #[test]
  fn test_listener_toggles_banner_and_requests_drain() {
    let manager = manager(FakeEndpoint::accepting(), true);
    let (tx, mut rx) = mpsc::unbounded_channel();
    manager.connectivity().subscribe(manager.listener(tx));

    manager.connectivity().signal(Offline);
    assert!(rx.try_recv().is_err());
    manager.connectivity().signal(Online);

    assert_eq!(rx.try_recv().unwrap(), DrainTrigger::Online);
    assert_eq!(
      manager.notifier().calls(),
      vec!["offline:show", "offline:hide"]
    );
  }
}
