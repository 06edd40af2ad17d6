//! Key-value string store backing the entry queue and the form draft.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

use crate::db::Database;

/// Storage key holding the serialized pending-entry queue.
pub const PENDING_ENTRIES_KEY: &str = "pendingEntries";
/// Storage key holding the serialized entry form draft.
pub const ENTRY_DRAFT_KEY: &str = "entryDraft";
/// Lease held by whichever process is draining the queue.
pub const DRAIN_LEASE_KEY: &str = "drainLease";
/// Last good recent-entries listing.
pub const ENTRIES_CACHE_KEY: &str = "entriesCache";
/// Last good clients, matters and timekeeper for the signed-in user.
pub const USER_DATA_KEY: &str = "userData";

/// Trait for string key-value backends.
pub trait KeyValueStore: Send + Sync {
  /// Read the value stored under `key`.
  fn get(&self, key: &str) -> Result<Option<String>>;

  /// Store `value` under `key`, replacing any previous value in one write.
  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Remove `key` if present.
  fn remove(&self, key: &str) -> Result<()>;

  /// Atomically claim the lease under `key` for `owner`.
  ///
  /// Succeeds when the lease is free, expired, or already held by `owner`
  /// (which renews it for another `ttl`).
  fn try_claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool>;

  /// Drop the lease under `key` if `owner` holds it.
  fn release(&self, key: &str, owner: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Lease {
  owner: String,
  /// Unix millis
  expires_at: i64,
}

impl Lease {
  fn new(owner: &str, ttl: Duration) -> Self {
    let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    Self {
      owner: owner.to_string(),
      expires_at: Utc::now().timestamp_millis().saturating_add(ttl),
    }
  }

  fn encode(&self) -> Result<String> {
    serde_json::to_string(self).map_err(|e| eyre!("Failed to serialize lease: {}", e))
  }

  fn decode(raw: &str) -> Option<Self> {
    match serde_json::from_str(raw) {
      Ok(lease) => Some(lease),
      Err(e) => {
        warn!(error = %e, "unreadable lease, treating it as free");
        None
      }
    }
  }

  /// Whether `owner` may take the lease stored as `raw`.
  fn claimable(raw: Option<&str>, owner: &str) -> bool {
    match raw.and_then(Self::decode) {
      None => true,
      Some(held) => held.owner == owner || held.expires_at <= Utc::now().timestamp_millis(),
    }
  }

  fn held_by(raw: Option<&str>, owner: &str) -> bool {
    raw
      .and_then(Self::decode)
      .is_some_and(|held| held.owner == owner)
  }
}

/// SQLite-backed key-value store.
pub struct SqliteKvStore {
  conn: Mutex<Connection>,
}

impl SqliteKvStore {
  pub fn new(db: Database) -> Self {
    Self {
      conn: Mutex::new(db.into_conn()),
    }
  }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<String>> {
  conn
    .query_row(
      "SELECT value FROM kv_store WHERE key = ?",
      params![key],
      |row| row.get(0),
    )
    .optional()
    .map_err(|e| eyre!("Failed to read key {}: {}", key, e))
}

fn write_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
  conn
    .execute(
      "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
       VALUES (?, ?, datetime('now'))",
      params![key, value],
    )
    .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;
  Ok(())
}

impl KeyValueStore for SqliteKvStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    read_value(&conn, key)
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    write_value(&conn, key, value)
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove key {}: {}", key, e))?;

    Ok(())
  }

  fn try_claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // IMMEDIATE takes the write lock up front, so two processes cannot both
    // see the lease as free.
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .map_err(|e| eyre!("Failed to lock {}: {}", key, e))?;

    let current = read_value(&tx, key)?;
    if !Lease::claimable(current.as_deref(), owner) {
      return Ok(false);
    }

    write_value(&tx, key, &Lease::new(owner, ttl).encode()?)?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit {}: {}", key, e))?;
    Ok(true)
  }

  fn release(&self, key: &str, owner: &str) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .map_err(|e| eyre!("Failed to lock {}: {}", key, e))?;

    let current = read_value(&tx, key)?;
    if Lease::held_by(current.as_deref(), owner) {
      tx.execute("DELETE FROM kv_store WHERE key = ?", params![key])
        .map_err(|e| eyre!("Failed to release {}: {}", key, e))?;
      tx.commit()
        .map_err(|e| eyre!("Failed to commit {}: {}", key, e))?;
    }
    Ok(())
  }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
  values: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
  pub fn with_value(key: &str, value: &str) -> Self {
    let store = Self::default();
    store
      .values
      .lock()
      .unwrap()
      .insert(key.to_string(), value.to_string());
    store
  }

  fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
    self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.values()?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    self.values()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.values()?.remove(key);
    Ok(())
  }

  fn try_claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
    let mut values = self.values()?;
    if !Lease::claimable(values.get(key).map(String::as_str), owner) {
      return Ok(false);
    }
    values.insert(key.to_string(), Lease::new(owner, ttl).encode()?);
    Ok(true)
  }

  fn release(&self, key: &str, owner: &str) -> Result<()> {
    let mut values = self.values()?;
    if Lease::held_by(values.get(key).map(String::as_str), owner) {
      values.remove(key);
    }
    Ok(())
  }
}

/// Memory store whose next read can be made to fail, as a locked database would.
#[cfg(test)]
#[derive(Default)]
pub struct BusyStore {
  inner: MemoryStore,
  fail_next: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl BusyStore {
  pub fn fail_next_read(&self) {
    self
      .fail_next
      .store(true, std::sync::atomic::Ordering::SeqCst);
  }
}

#[cfg(test)]
impl KeyValueStore for BusyStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
      return Err(eyre!("database is locked"));
    }
    self.inner.get(key)
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    self.inner.set(key, value)
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.inner.remove(key)
  }

  fn try_claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
    self.inner.try_claim(key, owner, ttl)
  }

  fn release(&self, key: &str, owner: &str) -> Result<()> {
    self.inner.release(key, owner)
  }
}
