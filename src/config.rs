use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub connectivity: ConnectivityConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Timekeeper used when a form leaves the field blank
  pub timekeeper: Option<String>,
  /// Override for the data directory (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_server_url")]
  pub url: String,
  #[serde(default = "default_save_path")]
  pub save_path: String,
  #[serde(default = "default_health_path")]
  pub health_path: String,
  #[serde(default = "default_listing_path")]
  pub listing_path: String,
  #[serde(default = "default_user_data_path")]
  pub user_data_path: String,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      url: default_server_url(),
      save_path: default_save_path(),
      health_path: default_health_path(),
      listing_path: default_listing_path(),
      user_data_path: default_user_data_path(),
      request_timeout_secs: default_request_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
  /// How often the health probe samples reachability
  #[serde(default = "default_probe_interval_secs")]
  pub probe_interval_secs: u64,
}

impl Default for ConnectivityConfig {
  fn default() -> Self {
    Self {
      probe_interval_secs: default_probe_interval_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Delay before the entries listing reloads after a successful drain
  #[serde(default = "default_reload_delay_ms")]
  pub reload_delay_ms: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      reload_delay_ms: default_reload_delay_ms(),
    }
  }
}

fn default_server_url() -> String {
  "http://127.0.0.1:5000".to_string()
}

fn default_save_path() -> String {
  "/api/quick-entry".to_string()
}

fn default_health_path() -> String {
  "/healthz".to_string()
}

fn default_listing_path() -> String {
  "/api/entries-cache".to_string()
}

fn default_user_data_path() -> String {
  "/api/user-data".to_string()
}

fn default_request_timeout_secs() -> u64 {
  30
}

fn default_probe_interval_secs() -> u64 {
  5
}

fn default_reload_delay_ms() -> u64 {
  1000
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./billable.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/billable/config.yaml
  ///
  /// Unlike an explicit path, a missing file in the default locations is not an
  /// error: the built-in defaults point at a local server.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("BILLABLE_SERVER_URL") {
      config.server.url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("billable.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("billable").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Directory holding the database and log files.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("billable"))
  }

  /// Join a server-relative path onto the configured base URL.
  pub fn endpoint(&self, path: &str) -> Result<url::Url> {
    let base = url::Url::parse(&self.server.url)
      .map_err(|e| eyre!("Invalid server url {}: {}", self.server.url, e))?;
    base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint path {}: {}", path, e))
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.server.request_timeout_secs)
  }

  pub fn probe_interval(&self) -> Duration {
    Duration::from_secs(self.connectivity.probe_interval_secs.max(1))
  }

  pub fn reload_delay(&self) -> Duration {
    Duration::from_millis(self.sync.reload_delay_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.server.url, "http://127.0.0.1:5000");
    assert_eq!(config.server.save_path, "/api/quick-entry");
    assert_eq!(config.sync.reload_delay_ms, 1000);
    assert!(config.timekeeper.is_none());
  }

  #[test]
  fn test_partial_server_section() {
    let config = Config::parse(
      "server:\n  url: https://time.example.com\ntimekeeper: J. Doe\n",
    )
    .unwrap();
    assert_eq!(config.server.url, "https://time.example.com");
    assert_eq!(config.server.health_path, "/healthz");
    assert_eq!(config.timekeeper.as_deref(), Some("J. Doe"));
  }

  #[test]
  fn test_endpoint_join() {
    let config = Config::parse("server:\n  url: https://time.example.com/\n").unwrap();
    let url = config.endpoint(&config.server.save_path).unwrap();
    assert_eq!(url.as_str(), "https://time.example.com/api/quick-entry");
  }

  #[test]
  fn test_probe_interval_never_zero() {
    let config = Config::parse("connectivity:\n  probe_interval_secs: 0\n").unwrap();
    assert_eq!(config.probe_interval(), Duration::from_secs(1));
  }
}
