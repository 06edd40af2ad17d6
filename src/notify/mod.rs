//! Transient notices: offline banner, sync-progress banner and toasts.

mod console;
mod dashboard;
mod surface;

pub use console::ConsoleNotifier;
pub use dashboard::DashboardNotifier;
pub(crate) use console::plural;
pub use surface::{ElementId, Notice, Phase, Surface};

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
  Success,
  Info,
  Warning,
}

/// Sink for the notices raised by the connectivity monitor and the sync engine.
pub trait Notifier: Send + Sync {
  fn show_offline_banner(&self);

  fn hide_offline_banner(&self);

  /// Show or update the sync banner with the number of entries still to send.
  fn show_sync_banner(&self, remaining: usize);

  fn hide_sync_banner(&self);

  fn toast(&self, kind: ToastKind, message: &str);

  /// Whether the entries listing is currently on screen.
  fn viewing_listing(&self) -> bool {
    false
  }

  /// Reload the entries listing after `delay`.
  fn schedule_reload(&self, _delay: Duration) {}
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::Mutex;

  /// Records every call as a short string.
  #[derive(Default)]
  pub(crate) struct RecordingNotifier {
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) viewing: bool,
  }

  impl RecordingNotifier {
    pub(crate) fn viewing_listing() -> Self {
      Self {
        calls: Mutex::new(Vec::new()),
        viewing: true,
      }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
      self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
      self.calls.lock().unwrap().push(call);
    }
  }

  impl Notifier for RecordingNotifier {
    fn show_offline_banner(&self) {
      self.record("offline:show".to_string());
    }

    fn hide_offline_banner(&self) {
      self.record("offline:hide".to_string());
    }

    fn show_sync_banner(&self, remaining: usize) {
      self.record(format!("sync:{}", remaining));
    }

    fn hide_sync_banner(&self) {
      self.record("sync:hide".to_string());
    }

    fn toast(&self, kind: ToastKind, message: &str) {
      self.record(format!("toast:{:?}:{}", kind, message));
    }

    fn viewing_listing(&self) -> bool {
      self.viewing
    }

    fn schedule_reload(&self, delay: Duration) {
      self.record(format!("reload:{}ms", delay.as_millis()));
    }
  }
}
