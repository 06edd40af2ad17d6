use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

use super::{Notifier, Surface, ToastKind};

/// Notifier backing the `watch` dashboard.
///
/// Notices land on a shared [`Surface`] that the render loop reads; listing
/// reloads are delivered on `reloads` after the requested delay.
pub struct DashboardNotifier {
  surface: Arc<Mutex<Surface>>,
  viewing: AtomicBool,
  reloads: mpsc::UnboundedSender<()>,
}

impl DashboardNotifier {
  pub fn new(reloads: mpsc::UnboundedSender<()>) -> Self {
    Self {
      surface: Arc::new(Mutex::new(Surface::new())),
      viewing: AtomicBool::new(false),
      reloads,
    }
  }

  pub fn surface(&self) -> Option<MutexGuard<'_, Surface>> {
    match self.surface.lock() {
      Ok(surface) => Some(surface),
      Err(e) => {
        warn!(error = %e, "notice surface poisoned");
        None
      }
    }
  }

  pub fn set_viewing_listing(&self, viewing: bool) {
    self.viewing.store(viewing, Ordering::SeqCst);
  }

  fn with_surface(&self, apply: impl FnOnce(&mut Surface, Instant)) {
    if let Some(mut surface) = self.surface() {
      apply(&mut surface, Instant::now());
    }
  }
}

impl Notifier for DashboardNotifier {
  fn show_offline_banner(&self) {
    self.with_surface(|s, now| s.show_offline(now));
  }

  fn hide_offline_banner(&self) {
    self.with_surface(|s, now| s.hide_offline(now));
  }

  fn show_sync_banner(&self, remaining: usize) {
    self.with_surface(|s, now| s.show_syncing(remaining, now));
  }

  fn hide_sync_banner(&self) {
    self.with_surface(|s, now| s.hide_syncing(now));
  }

  fn toast(&self, kind: ToastKind, message: &str) {
    self.with_surface(|s, now| s.toast(kind, message, now));
  }

  fn viewing_listing(&self) -> bool {
    self.viewing.load(Ordering::SeqCst)
  }

  fn schedule_reload(&self, delay: Duration) {
    let reloads = self.reloads.clone();
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = reloads.send(());
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::notify::{ElementId, Notice};

  #[test]
  fn test_notices_reach_surface() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let notifier = DashboardNotifier::new(tx);

    notifier.show_sync_banner(3);
    notifier.show_sync_banner(2);

    let surface = notifier.surface().unwrap();
    let (notice, _) = surface.get(ElementId::SyncBanner).unwrap();
    assert_eq!(*notice, Notice::Syncing { remaining: 2 });
    assert_eq!(surface.elements().count(), 1);
  }

  #[tokio::test]
  async fn test_reload_after_delay() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = DashboardNotifier::new(tx);
    notifier.set_viewing_listing(true);
    assert!(notifier.viewing_listing());

    notifier.schedule_reload(Duration::from_millis(20));
    assert!(rx.try_recv().is_err());

    let reload = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
    assert_eq!(reload.unwrap(), Some(()));
  }
}
