use super::{Notifier, ToastKind};

/// Line-oriented notices for one-shot commands.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
  fn show_offline_banner(&self) {
    println!("offline: entries will be queued and synced when the server is reachable");
  }

  fn hide_offline_banner(&self) {}

  fn show_sync_banner(&self, remaining: usize) {
    println!("syncing {} pending {}...", remaining, plural(remaining));
  }

  fn hide_sync_banner(&self) {}

  fn toast(&self, kind: ToastKind, message: &str) {
    let tag = match kind {
      ToastKind::Success => "ok",
      ToastKind::Info => "info",
      ToastKind::Warning => "warn",
    };
    println!("[{}] {}", tag, message);
  }
}

pub(crate) fn plural(count: usize) -> &'static str {
  if count == 1 {
    "entry"
  } else {
    "entries"
  }
}
