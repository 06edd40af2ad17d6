use color_eyre::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::kv::KeyValueStore;
use crate::notify::{Notifier, ToastKind};
use crate::queue::QueueStore;
use crate::remote::{RemoteEndpoint, SaveOutcome, SavePayload};

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
  /// Requests issued
  pub attempted: usize,
  /// Entries accepted and removed from the queue
  pub succeeded: usize,
  /// Entries answered with a non-2xx status (still queued)
  pub rejected: usize,
  /// The pass stopped early on a transport failure
  pub aborted: bool,
  /// Another pass was already running; nothing was done
  pub skipped: bool,
}

impl DrainReport {
  fn skipped() -> Self {
    Self {
      skipped: true,
      ..Self::default()
    }
  }
}

/// Lifetime of the drain lease between renewals. Renewed after every
/// request, so it only has to outlast one request timeout.
const LEASE_TTL: Duration = Duration::from_secs(120);

static NEXT_ENGINE: AtomicU64 = AtomicU64::new(0);

fn lease_owner() -> String {
  format!(
    "{}-{}",
    std::process::id(),
    NEXT_ENGINE.fetch_add(1, Ordering::Relaxed)
  )
}

pub struct SyncEngine<S, R, N>
where
  S: KeyValueStore,
  R: RemoteEndpoint,
  N: Notifier,
{
  queue: Arc<QueueStore<S>>,
  remote: Arc<R>,
  notifier: Arc<N>,
  reload_delay: Duration,
  /// Held for the duration of a pass
  running: Mutex<()>,
  /// Identifies this engine in the drain lease shared across processes
  owner: String,
}

impl<S, R, N> SyncEngine<S, R, N>
where
  S: KeyValueStore,
  R: RemoteEndpoint,
  N: Notifier,
{
  pub fn new(
    queue: Arc<QueueStore<S>>,
    remote: Arc<R>,
    notifier: Arc<N>,
    reload_delay: Duration,
  ) -> Self {
    Self {
      queue,
      remote,
      notifier,
      reload_delay,
      running: Mutex::new(()),
      owner: lease_owner(),
    }
  }

  /// Attempt every pending entry once, oldest first.
  ///
  /// A non-2xx answer keeps the entry and moves on; a transport failure keeps
  /// the entry and ends the pass. Accepted entries are removed from the store
  /// before the pass releases its guard, so no later pass resubmits them.
  /// Passes are exclusive within the process and, through the drain lease,
  /// across every process sharing the store.
  pub async fn drain(&self) -> Result<DrainReport> {
    let Ok(_running) = self.running.try_lock() else {
      debug!("drain already in progress, skipping");
      return Ok(DrainReport::skipped());
    };

    if !self.queue.claim_drain(&self.owner, LEASE_TTL)? {
      debug!("another process is draining, skipping");
      return Ok(DrainReport::skipped());
    }

    let result = self.pass().await;
    if let Err(e) = self.queue.release_drain(&self.owner) {
      warn!(error = %e, "failed to release drain lease");
    }
    result
  }

  async fn pass(&self) -> Result<DrainReport> {
    let mut snapshot = self.queue.load();
    let total = snapshot.iter().filter(|e| !e.synced).count();
    if total == 0 {
      return Ok(DrainReport::default());
    }

    info!(pending = total, "draining pending entries");
    self.notifier.show_sync_banner(total);

    let mut report = DrainReport::default();
    let mut succeeded: HashSet<String> = HashSet::new();

    for entry in snapshot.iter_mut().filter(|e| !e.synced) {
      report.attempted += 1;
      let payload = SavePayload::from(&*entry);

      match self.remote.save(&payload).await {
        Ok(SaveOutcome::Accepted { redirect }) => {
          debug!(id = %entry.id, ?redirect, "entry accepted");
          entry.synced = true;
          succeeded.insert(entry.id.clone());
          report.succeeded += 1;
          self.notifier.show_sync_banner(total - report.succeeded);
        }
        Ok(SaveOutcome::Rejected { status }) => {
          warn!(id = %entry.id, status, "entry rejected, keeping it queued");
          report.rejected += 1;
        }
        Err(e) => {
          warn!(id = %entry.id, error = %e, "connection lost, aborting drain");
          report.aborted = true;
          break;
        }
      }

      match self.queue.claim_drain(&self.owner, LEASE_TTL) {
        Ok(true) => {}
        Ok(false) => {
          warn!("drain lease lost, stopping");
          report.aborted = true;
          break;
        }
        Err(e) => {
          warn!(error = %e, "drain lease not renewed, stopping");
          report.aborted = true;
          break;
        }
      }
    }

    let persisted = self.queue.retain(|e| !succeeded.contains(&e.id));
    self.notifier.hide_sync_banner();

    if let Err(e) = persisted {
      error!(error = %e, succeeded = report.succeeded, "failed to drop synced entries");
      return Err(e);
    }

    info!(
      attempted = report.attempted,
      succeeded = report.succeeded,
      rejected = report.rejected,
      aborted = report.aborted,
      "drain finished"
    );

    if report.succeeded > 0 {
      let message = format!(
        "Synced {} {}",
        report.succeeded,
        crate::notify::plural(report.succeeded)
      );
      self.notifier.toast(ToastKind::Success, &message);
      if self.notifier.viewing_listing() {
        self.notifier.schedule_reload(self.reload_delay);
      }
    }

    Ok(report)
  }

  pub fn pending_count(&self) -> usize {
    self.queue.pending_count()
  }
}
