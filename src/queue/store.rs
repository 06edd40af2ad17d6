use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use super::entry::PendingEntry;
use crate::kv::{KeyValueStore, DRAIN_LEASE_KEY, PENDING_ENTRIES_KEY};

/// Owner of the persisted queue snapshot.
///
/// Every mutation re-reads storage, applies the change and writes the whole
/// collection back with a single `set`, so a writer in another process is
/// never overwritten with a stale copy. A mutation whose read fails is
/// refused rather than applied to an empty queue.
pub struct QueueStore<S: KeyValueStore> {
  kv: Arc<S>,
  /// Serializes read-modify-write cycles within this process
  writing: Mutex<()>,
}

impl<S: KeyValueStore> QueueStore<S> {
  pub fn new(kv: Arc<S>) -> Self {
    Self {
      kv,
      writing: Mutex::new(()),
    }
  }

  /// Read the persisted queue in FIFO order.
  ///
  /// Corrupt or unreadable state is logged and treated as an empty queue.
  pub fn load(&self) -> Vec<PendingEntry> {
    self.read_persisted().unwrap_or_else(|e| {
      warn!(error = %e, "failed to read pending entries, treating queue as empty");
      Vec::new()
    })
  }

  /// Append an entry and persist the updated queue immediately.
  pub fn append(&self, mut entry: PendingEntry) -> Result<PendingEntry> {
    let _writing = self.lock()?;
    let mut entries = self.read_persisted()?;

    while entries.iter().any(|e| e.id == entry.id) {
      debug!(id = %entry.id, "queued entry id collision, restamping");
      entry.restamp();
    }
    entry.synced = false;
    entries.push(entry.clone());

    self.persist(&entries)?;
    Ok(entry)
  }

  /// Overwrite the persisted queue wholesale.
  pub fn replace(&self, entries: Vec<PendingEntry>) -> Result<()> {
    let _writing = self.lock()?;
    self.persist(&entries)
  }

  /// Keep only entries matching `keep`; returns how many were dropped.
  pub fn retain<F>(&self, mut keep: F) -> Result<usize>
  where
    F: FnMut(&PendingEntry) -> bool,
  {
    let _writing = self.lock()?;
    let mut entries = self.read_persisted()?;
    let before = entries.len();
    entries.retain(|e| keep(e));
    let dropped = before - entries.len();

    if dropped > 0 {
      self.persist(&entries)?;
    }
    Ok(dropped)
  }

  /// Number of entries not yet synced.
  pub fn pending_count(&self) -> usize {
    self.load().iter().filter(|e| !e.synced).count()
  }

  /// Take or renew the drain lease shared by every process on this store.
  pub fn claim_drain(&self, owner: &str, ttl: Duration) -> Result<bool> {
    self.kv.try_claim(DRAIN_LEASE_KEY, owner, ttl)
  }

  pub fn release_drain(&self, owner: &str) -> Result<()> {
    self.kv.release(DRAIN_LEASE_KEY, owner)
  }

  fn lock(&self) -> Result<MutexGuard<'_, ()>> {
    self
      .writing
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Storage errors propagate; a value that does not parse counts as empty.
  fn read_persisted(&self) -> Result<Vec<PendingEntry>> {
    let Some(raw) = self
      .kv
      .get(PENDING_ENTRIES_KEY)
      .map_err(|e| e.wrap_err("Failed to read pending entries"))?
    else {
      return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<PendingEntry>>(&raw) {
      Ok(entries) => Ok(entries),
      Err(e) => {
        warn!(error = %e, "pending entries are corrupt, treating queue as empty");
        Ok(Vec::new())
      }
    }
  }

  fn persist(&self, entries: &[PendingEntry]) -> Result<()> {
    // Synced entries are finished; they are dropped rather than stored flagged.
    let unsynced: Vec<&PendingEntry> = entries.iter().filter(|e| !e.synced).collect();
    let json = serde_json::to_string(&unsynced)
      .map_err(|e| eyre!("Failed to serialize pending entries: {}", e))?;
    self.kv.set(PENDING_ENTRIES_KEY, &json)?;
    debug!(count = unsynced.len(), "persisted pending entries");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use crate::kv::{BusyStore, MemoryStore, SqliteKvStore};
  use crate::queue::entry::tests::entry;

  fn memory_queue() -> QueueStore<MemoryStore> {
    QueueStore::new(Arc::new(MemoryStore::default()))
  }

  #[test]
  fn test_empty_round_trip() {
    let queue = memory_queue();
    queue.replace(Vec::new()).unwrap();
    assert!(queue.load().is_empty());
  }

  #[test]
  fn test_round_trip_fidelity_sqlite() {
    let kv = Arc::new(SqliteKvStore::new(Database::open_in_memory().unwrap()));
    let queue = QueueStore::new(kv);

    let mut a = entry("A");
    a.timekeeper = Some("J. Doe".to_string());
    let b = entry("B");
    queue.replace(vec![a.clone(), b.clone()]).unwrap();

    assert_eq!(queue.load(), vec![a, b]);
  }

  #[test]
  fn test_corrupt_storage_loads_empty() {
    let kv = Arc::new(MemoryStore::with_value(PENDING_ENTRIES_KEY, "{not json"));
    let queue = QueueStore::new(kv);
    assert!(queue.load().is_empty());
    assert_eq!(queue.pending_count(), 0);
  }

  #[test]
  fn test_wrong_shape_loads_empty() {
    let kv = Arc::new(MemoryStore::with_value(
      PENDING_ENTRIES_KEY,
      r#"[{"id":"x","hours":-3}]"#,
    ));
    assert!(QueueStore::new(kv).load().is_empty());
  }

  #[test]
  fn test_append_preserves_order_and_persists() {
    let kv = Arc::new(MemoryStore::default());
    let queue = QueueStore::new(kv.clone());
    let a = queue.append(entry("A")).unwrap();
    let b = queue.append(entry("B")).unwrap();

    // A second store over the same backend sees the writes.
    let other = QueueStore::new(kv);
    let ids: Vec<String> = other.load().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert_eq!(other.pending_count(), 2);
  }

  #[test]
  fn test_append_restamps_duplicate_id() {
    let queue = memory_queue();
    let a = queue.append(entry("A")).unwrap();
    let mut dup = entry("B");
    dup.id = a.id.clone();

    let stored = queue.append(dup).unwrap();
    assert_ne!(stored.id, a.id);
    assert_eq!(queue.load().len(), 2);
  }

  #[test]
  fn test_synced_entries_are_never_persisted() {
    let queue = memory_queue();
    let a = entry("A");
    let mut b = entry("B");
    b.synced = true;
    queue.replace(vec![a.clone(), b]).unwrap();
    assert_eq!(queue.load(), vec![a]);
  }

  #[test]
  fn test_retain_reports_dropped() {
    let queue = memory_queue();
    let a = queue.append(entry("A")).unwrap();
    queue.append(entry("B")).unwrap();

    let dropped = queue.retain(|e| e.id != a.id).unwrap();
    assert_eq!(dropped, 1);
    assert_eq!(queue.load().len(), 1);
  }

  #[test]
  fn test_append_refuses_when_storage_unreadable() {
    let kv = Arc::new(BusyStore::default());
    let queue = QueueStore::new(kv.clone());
    queue.append(entry("A")).unwrap();
    queue.append(entry("B")).unwrap();

    kv.fail_next_read();
    assert!(queue.append(entry("C")).is_err());

    let clients: Vec<String> = queue.load().into_iter().map(|e| e.client).collect();
    assert_eq!(clients, vec!["A", "B"]);
  }

  #[test]
  fn test_retain_refuses_when_storage_unreadable() {
    let kv = Arc::new(BusyStore::default());
    let queue = QueueStore::new(kv.clone());
    queue.append(entry("A")).unwrap();

    kv.fail_next_read();
    assert!(queue.retain(|_| false).is_err());
    assert_eq!(queue.load().len(), 1);
  }

  #[test]
  fn test_load_is_lenient_when_storage_unreadable() {
    let kv = Arc::new(BusyStore::default());
    let queue = QueueStore::new(kv.clone());
    queue.append(entry("A")).unwrap();

    kv.fail_next_read();
    assert!(queue.load().is_empty());
    assert_eq!(queue.load().len(), 1);
  }

  #[test]
  fn test_append_over_corrupt_queue_starts_fresh() {
    let kv = Arc::new(MemoryStore::with_value(PENDING_ENTRIES_KEY, "{not json"));
    let queue = QueueStore::new(kv);
    queue.append(entry("A")).unwrap();
    assert_eq!(queue.load().len(), 1);
  }
}
