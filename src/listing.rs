//! Server data shown offline: recent entries and the user's known names.

use color_eyre::Result;
use serde::Deserialize;
use url::Url;

use crate::cache::CacheSource;
use crate::kv::{KeyValueStore, ENTRIES_CACHE_KEY, USER_DATA_KEY};
use crate::snapshot::Snapshots;
use crate::worker::WorkerHandle;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListedEntry {
  pub id: i64,
  pub client: String,
  pub matter: String,
  pub date_of_work: String,
  pub hours: f64,
  #[serde(default)]
  pub timekeeper: Option<String>,
  #[serde(default)]
  pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Listing {
  pub entries: Vec<ListedEntry>,
  #[serde(default)]
  pub cached_at: Option<String>,
}

/// Clients and matters the user has billed before, for form completion.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserData {
  #[serde(default)]
  pub clients: Vec<String>,
  #[serde(default)]
  pub matters: Vec<String>,
  #[serde(default)]
  pub timekeeper: Option<String>,
}

/// Load the listing through the shell worker, falling back to the last good copy.
pub async fn fetch<S: KeyValueStore>(
  worker: &WorkerHandle,
  snapshots: &Snapshots<S>,
  url: Url,
) -> Result<(Listing, CacheSource)> {
  snapshots
    .fetch(worker, url, ENTRIES_CACHE_KEY)
    .await
    .map_err(|e| e.wrap_err("Entries listing unavailable"))
}

pub async fn fetch_user_data<S: KeyValueStore>(
  worker: &WorkerHandle,
  snapshots: &Snapshots<S>,
  url: Url,
) -> Result<(UserData, CacheSource)> {
  snapshots
    .fetch(worker, url, USER_DATA_KEY)
    .await
    .map_err(|e| e.wrap_err("User data unavailable"))
}

/// Stored user data, without touching the network.
pub fn cached_user_data<S: KeyValueStore>(snapshots: &Snapshots<S>) -> Option<UserData> {
  snapshots.cached(USER_DATA_KEY)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{FakeNetwork, SqliteStorage};
  use crate::db::Database;
  use crate::kv::MemoryStore;
  use crate::worker::ShellWorker;
  use std::sync::Arc;

  const BODY: &str = r#"{
    "entries": [
      {"id": 7, "client": "Acme", "matter": "General", "date_of_work": "2024-03-01",
       "hours": 1.5, "timekeeper": null, "desc": "review"}
    ],
    "cached_at": "2024-03-01T10:00:00"
  }"#;

  const USER: &str = r#"{"clients": ["Acme", "Globex"], "matters": ["General"], "timekeeper": "J. Doe"}"#;

  fn spawn(network: Arc<FakeNetwork>) -> (WorkerHandle, Url) {
    let storage = Arc::new(SqliteStorage::new(Database::open_in_memory().unwrap()));
    let base = Url::parse("http://h").unwrap();
    let (worker, _page) = ShellWorker::spawn(storage, network, base.clone());
    (worker, base)
  }

  #[test]
  fn test_parse_listing() {
    let listing = serde_json::from_str::<Listing>(BODY).unwrap();
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].client, "Acme");
    assert_eq!(listing.entries[0].timekeeper, None);
    assert_eq!(listing.cached_at.as_deref(), Some("2024-03-01T10:00:00"));
  }

  #[test]
  fn test_parse_rejects_garbage() {
    assert!(serde_json::from_str::<Listing>("<html>login</html>").is_err());
  }

  #[tokio::test]
  async fn test_fetch_through_worker() {
    let network = Arc::new(FakeNetwork::serving(&[("/api/entries-cache", BODY)]));
    let (worker, base) = spawn(network);
    let snapshots = Snapshots::new(Arc::new(MemoryStore::default()));

    let (listing, source) = fetch(&worker, &snapshots, base.join("/api/entries-cache").unwrap())
      .await
      .unwrap();
    assert_eq!(source, CacheSource::Network);
    assert_eq!(listing.entries[0].id, 7);
  }

  #[tokio::test]
  async fn test_listing_survives_going_offline() {
    let network = Arc::new(FakeNetwork::serving(&[("/api/entries-cache", BODY)]));
    let (worker, base) = spawn(network.clone());
    let snapshots = Snapshots::new(Arc::new(MemoryStore::default()));
    let url = base.join("/api/entries-cache").unwrap();

    fetch(&worker, &snapshots, url.clone()).await.unwrap();
    network.set_offline(true);

    let (listing, source) = fetch(&worker, &snapshots, url).await.unwrap();
    assert_eq!(source, CacheSource::Cache);
    assert_eq!(listing.entries[0].client, "Acme");
    assert_eq!(listing.cached_at.as_deref(), Some("2024-03-01T10:00:00"));
  }

  #[tokio::test]
  async fn test_fetch_reports_status() {
    let (worker, base) = spawn(Arc::new(FakeNetwork::default()));
    let snapshots = Snapshots::new(Arc::new(MemoryStore::default()));

    let err = fetch(&worker, &snapshots, base.join("/api/entries-cache").unwrap())
      .await
      .unwrap_err();
    assert!(format!("{:#}", err).contains("404"));
  }

  #[tokio::test]
  async fn test_user_data_cached_for_offline_forms() {
    let network = Arc::new(FakeNetwork::serving(&[("/api/user-data", USER)]));
    let (worker, base) = spawn(network);
    let snapshots = Snapshots::new(Arc::new(MemoryStore::default()));
    assert!(cached_user_data(&snapshots).is_none());

    let (user, _) = fetch_user_data(&worker, &snapshots, base.join("/api/user-data").unwrap())
      .await
      .unwrap();
    assert_eq!(user.clients, vec!["Acme", "Globex"]);

    let cached = cached_user_data(&snapshots).unwrap();
    assert_eq!(cached.timekeeper.as_deref(), Some("J. Doe"));
    assert_eq!(cached.matters, vec!["General"]);
  }
}
