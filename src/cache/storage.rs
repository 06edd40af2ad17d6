//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

use super::traits::{CachedResponse, ShellRequest};
use crate::db::Database;

/// Trait for named-bucket response stores.
pub trait CacheStorage: Send + Sync {
  /// Names of every bucket, oldest first.
  fn bucket_names(&self) -> Result<Vec<String>>;

  /// Create `name` if it does not exist yet.
  fn open_bucket(&self, name: &str) -> Result<()>;

  /// Drop a bucket and everything in it.
  fn delete_bucket(&self, name: &str) -> Result<()>;

  /// Store every response in `bucket` in one transaction; either all land or none.
  fn put_all(&self, bucket: &str, responses: &[(ShellRequest, CachedResponse)]) -> Result<()>;

  /// Exact-request lookup across all buckets.
  fn match_request(&self, request: &ShellRequest) -> Result<Option<CachedResponse>>;
}

/// SQLite-based cache storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  pub fn new(db: Database) -> Self {
    Self {
      conn: Mutex::new(db.into_conn()),
    }
  }
}

impl CacheStorage for SqliteStorage {
  fn bucket_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_buckets ORDER BY created_at, rowid")
      .map_err(|e| eyre!("Failed to prepare bucket query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list buckets: {}", e))?
      .collect::<Result<Vec<String>, _>>()
      .map_err(|e| eyre!("Failed to read bucket row: {}", e))?;

    Ok(names)
  }

  fn open_bucket(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open bucket {}: {}", name, e))?;

    Ok(())
  }

  fn delete_bucket(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_buckets WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete bucket {}: {}", name, e))?;

    Ok(())
  }

  fn put_all(&self, bucket: &str, responses: &[(ShellRequest, CachedResponse)]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to start transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
      params![bucket],
    )
    .map_err(|e| eyre!("Failed to open bucket {}: {}", bucket, e))?;

    for (request, response) in responses {
      tx.execute(
        "INSERT OR REPLACE INTO cache_entries
         (bucket, request_hash, request_key, status, content_type, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          bucket,
          request.cache_hash(),
          request.cache_key(),
          response.status,
          response.content_type,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to cache {}: {}", request.cache_key(), e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit cache transaction: {}", e))?;

    Ok(())
  }

  fn match_request(&self, request: &ShellRequest) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT status, content_type, body FROM cache_entries
         WHERE request_hash = ?
         ORDER BY cached_at DESC
         LIMIT 1",
        params![request.cache_hash()],
        |row| {
          Ok(CachedResponse {
            status: row.get(0)?,
            content_type: row.get(1)?,
            body: row.get(2)?,
          })
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", request.cache_key(), e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn storage() -> SqliteStorage {
    SqliteStorage::new(Database::open_in_memory().unwrap())
  }

  fn request(path: &str) -> ShellRequest {
    ShellRequest::get(Url::parse("http://h").unwrap().join(path).unwrap())
  }

  fn page(body: &str) -> CachedResponse {
    CachedResponse {
      status: 200,
      content_type: Some("text/html".to_string()),
      body: body.as_bytes().to_vec(),
    }
  }

  #[test]
  fn test_put_and_match() {
    let storage = storage();
    storage
      .put_all("shell-v1", &[(request("/"), page("root")), (request("/login"), page("login"))])
      .unwrap();

    let hit = storage.match_request(&request("/login")).unwrap().unwrap();
    assert_eq!(hit.text(), "login");
    assert!(storage.match_request(&request("/entries")).unwrap().is_none());
  }

  #[test]
  fn test_delete_bucket_drops_entries() {
    let storage = storage();
    storage.put_all("shell-v1", &[(request("/"), page("old"))]).unwrap();
    storage.open_bucket("shell-v2").unwrap();
    assert_eq!(storage.bucket_names().unwrap(), vec!["shell-v1", "shell-v2"]);

    storage.delete_bucket("shell-v1").unwrap();
    assert_eq!(storage.bucket_names().unwrap(), vec!["shell-v2"]);
    assert!(storage.match_request(&request("/")).unwrap().is_none());
  }

  #[test]
  fn test_open_bucket_is_idempotent() {
    let storage = storage();
    storage.open_bucket("shell-v1").unwrap();
    storage.open_bucket("shell-v1").unwrap();
    assert_eq!(storage.bucket_names().unwrap().len(), 1);
  }
}
