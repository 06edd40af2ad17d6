//! Client for the remote save endpoint.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::queue::PendingEntry;

/// Body posted to the save endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavePayload {
  pub client: String,
  pub matter: String,
  pub hours: f64,
  pub desc: String,
  pub date_of_work: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timekeeper: Option<String>,
}

impl From<&PendingEntry> for SavePayload {
  fn from(entry: &PendingEntry) -> Self {
    Self {
      client: entry.client.clone(),
      matter: entry.matter.clone(),
      hours: entry.hours.as_f64(),
      desc: entry.description.clone(),
      date_of_work: entry.date_of_work.format("%Y-%m-%d").to_string(),
      timekeeper: entry.timekeeper.clone(),
    }
  }
}

/// The endpoint answered; the status decides acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
  /// Any 2xx status
  Accepted { redirect: Option<String> },
  /// Any other status
  Rejected { status: u16 },
}

/// The request could not be sent or its response never arrived.
#[derive(Debug, Clone, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// The remote save endpoint.
pub trait RemoteEndpoint: Send + Sync {
  fn save(
    &self,
    payload: &SavePayload,
  ) -> impl Future<Output = Result<SaveOutcome, TransportError>> + Send;
}

/// HTTP implementation posting JSON to the configured save path.
#[derive(Clone)]
pub struct HttpEndpoint {
  client: reqwest::Client,
  save_url: url::Url,
}

impl HttpEndpoint {
  pub fn new(config: &Config) -> Result<Self> {
    let client = http_client(config.request_timeout())?;
    let save_url = config.endpoint(&config.server.save_path)?;
    Ok(Self { client, save_url })
  }
}

impl RemoteEndpoint for HttpEndpoint {
  async fn save(&self, payload: &SavePayload) -> Result<SaveOutcome, TransportError> {
    let response = self
      .client
      .post(self.save_url.clone())
      .json(payload)
      .send()
      .await
      .map_err(|e| TransportError(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
      let redirect = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
      Ok(SaveOutcome::Accepted { redirect })
    } else {
      Ok(SaveOutcome::Rejected {
        status: status.as_u16(),
      })
    }
  }
}

/// Shared client builder: no redirects followed so the Location header reaches us.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(timeout)
    .redirect(reqwest::redirect::Policy::none())
    .user_agent(concat!("billable/", env!("CARGO_PKG_VERSION")))
    .build()
    .map_err(|e| eyre!("Failed to build HTTP client: {}", e))
}
