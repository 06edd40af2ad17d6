//! Online/offline tracking.
//!
//! The monitor is driven purely by signals from its environment. In a native
//! process the environment is [`HealthProbe`], sampled by [`spawn_signals`],
//! which only emits when reachability changes.

use color_eyre::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::remote::http_client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
  Online,
  Offline,
}

impl ConnectivityState {
  pub fn is_online(self) -> bool {
    self == Self::Online
  }
}

/// Source of the environment's view of reachability.
pub trait ConnectivityProvider: Send + Sync {
  fn current(&self) -> impl Future<Output = ConnectivityState> + Send;
}

/// Reachability of the server's health endpoint; any HTTP response counts.
pub struct HealthProbe {
  client: reqwest::Client,
  health_url: url::Url,
}

impl HealthProbe {
  pub fn new(config: &Config) -> Result<Self> {
    // A probe that hangs would delay every transition, so it gets its own short timeout.
    let timeout = config.request_timeout().min(Duration::from_secs(5));
    Ok(Self {
      client: http_client(timeout)?,
      health_url: config.endpoint(&config.server.health_path)?,
    })
  }
}

impl ConnectivityProvider for HealthProbe {
  async fn current(&self) -> ConnectivityState {
    match self.client.get(self.health_url.clone()).send().await {
      Ok(_) => ConnectivityState::Online,
      Err(e) => {
        debug!(error = %e, "health probe failed");
        ConnectivityState::Offline
      }
    }
  }
}

/// Sample `provider` every `interval` and emit a signal whenever the reported
/// state differs from the last one. Stops when the receiver is dropped.
pub fn spawn_signals<P>(
  provider: Arc<P>,
  initial: ConnectivityState,
  interval: Duration,
) -> mpsc::UnboundedReceiver<ConnectivityState>
where
  P: ConnectivityProvider + 'static,
{
  let (tx, rx) = mpsc::unbounded_channel();

  tokio::spawn(async move {
    let mut last = initial;
    loop {
      tokio::time::sleep(interval).await;
      let reported = provider.current().await;
      if reported != last {
        last = reported;
        if tx.send(reported).is_err() {
          break;
        }
      } else if tx.is_closed() {
        break;
      }
    }
  });

  rx
}

/// Callbacks invoked on connectivity transitions.
pub trait ConnectivityListener: Send + Sync {
  fn on_online(&self);
  fn on_offline(&self);
}

/// Process-wide connectivity state.
pub struct ConnectivityMonitor {
  online: AtomicBool,
  listeners: RwLock<Vec<Arc<dyn ConnectivityListener>>>,
}

impl ConnectivityMonitor {
  pub fn new(initial: ConnectivityState) -> Self {
    Self {
      online: AtomicBool::new(initial.is_online()),
      listeners: RwLock::new(Vec::new()),
    }
  }

  pub fn state(&self) -> ConnectivityState {
    if self.online.load(Ordering::SeqCst) {
      ConnectivityState::Online
    } else {
      ConnectivityState::Offline
    }
  }

  pub fn is_online(&self) -> bool {
    self.state().is_online()
  }

  pub fn subscribe(&self, listener: Arc<dyn ConnectivityListener>) {
    match self.listeners.write() {
      Ok(mut listeners) => listeners.push(listener),
      Err(e) => warn!(error = %e, "connectivity listeners poisoned, listener dropped"),
    }
  }

  /// Apply an environment signal. Returns true if the state changed, in which
  /// case every listener has been notified.
  pub fn signal(&self, reported: ConnectivityState) -> bool {
    let was_online = self.online.swap(reported.is_online(), Ordering::SeqCst);
    if was_online == reported.is_online() {
      return false;
    }

    match reported {
      ConnectivityState::Online => info!("connectivity: online"),
      ConnectivityState::Offline => warn!("connectivity: offline"),
    }

    let listeners = match self.listeners.read() {
      Ok(listeners) => listeners.clone(),
      Err(e) => {
        warn!(error = %e, "connectivity listeners poisoned");
        return true;
      }
    };

    for listener in listeners {
      match reported {
        ConnectivityState::Online => listener.on_online(),
        ConnectivityState::Offline => listener.on_offline(),
      }
    }

    true
  }

  /// Feed signals into the monitor until the source closes.
  pub async fn run(self: Arc<Self>, mut signals: mpsc::UnboundedReceiver<ConnectivityState>) {
    while let Some(reported) = signals.recv().await {
      self.signal(reported);
    }
    debug!("connectivity signal source closed");
  }
}
