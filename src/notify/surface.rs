use std::time::{Duration, Instant};
use tracing::trace;

use super::ToastKind;

/// Enter and exit transition length.
pub const TRANSITION: Duration = Duration::from_millis(300);
/// How long a toast stays up before it starts leaving.
pub const TOAST_VISIBLE: Duration = Duration::from_secs(3);

/// Stable identity of an on-screen element; showing it again reuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementId {
  OfflineBanner,
  SyncBanner,
  Toast,
}

impl ElementId {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::OfflineBanner => "offline-banner",
      Self::SyncBanner => "sync-banner",
      Self::Toast => "toast",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  Offline,
  Syncing { remaining: usize },
  Toast { kind: ToastKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Entering,
  Visible,
  Leaving,
}

#[derive(Debug, Clone)]
struct Element {
  id: ElementId,
  notice: Notice,
  phase: Phase,
  shown_at: Instant,
  phase_at: Instant,
}

/// Time-driven projection of the current notices.
#[derive(Debug, Default)]
pub struct Surface {
  elements: Vec<Element>,
}

impl Surface {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn show_offline(&mut self, now: Instant) {
    self.show(ElementId::OfflineBanner, Notice::Offline, now);
  }

  pub fn hide_offline(&mut self, now: Instant) {
    self.hide(ElementId::OfflineBanner, now);
  }

  pub fn show_syncing(&mut self, remaining: usize, now: Instant) {
    self.show(ElementId::SyncBanner, Notice::Syncing { remaining }, now);
  }

  pub fn hide_syncing(&mut self, now: Instant) {
    self.hide(ElementId::SyncBanner, now);
  }

  pub fn toast(&mut self, kind: ToastKind, message: &str, now: Instant) {
    let notice = Notice::Toast {
      kind,
      message: message.to_string(),
    };
    self.show(ElementId::Toast, notice, now);
  }

  fn show(&mut self, id: ElementId, notice: Notice, now: Instant) {
    if let Some(element) = self.elements.iter_mut().find(|e| e.id == id) {
      let restart = id == ElementId::Toast || element.phase == Phase::Leaving;
      element.notice = notice;
      if restart {
        element.shown_at = now;
        element.phase = Phase::Visible;
        element.phase_at = now;
      }
      return;
    }

    trace!(element = id.as_str(), "notice added");
    self.elements.push(Element {
      id,
      notice,
      phase: Phase::Entering,
      shown_at: now,
      phase_at: now,
    });
    self.elements.sort_by_key(|e| e.id);
  }

  fn hide(&mut self, id: ElementId, now: Instant) {
    if let Some(element) = self.elements.iter_mut().find(|e| e.id == id) {
      if element.phase != Phase::Leaving {
        element.phase = Phase::Leaving;
        element.phase_at = now;
      }
    }
  }

  /// Advance transitions; returns true if anything changed.
  pub fn tick(&mut self, now: Instant) -> bool {
    let mut changed = false;

    for element in &mut self.elements {
      let in_phase = now.saturating_duration_since(element.phase_at);
      match element.phase {
        Phase::Entering if in_phase >= TRANSITION => {
          element.phase = Phase::Visible;
          element.phase_at = now;
          changed = true;
        }
        Phase::Entering | Phase::Visible
          if element.id == ElementId::Toast
            && now.saturating_duration_since(element.shown_at) >= TOAST_VISIBLE =>
        {
          element.phase = Phase::Leaving;
          element.phase_at = now;
          changed = true;
        }
        _ => {}
      }
    }

    let before = self.elements.len();
    self.elements.retain(|e| {
      !(e.phase == Phase::Leaving && now.saturating_duration_since(e.phase_at) >= TRANSITION)
    });

    changed || self.elements.len() != before
  }

  pub fn get(&self, id: ElementId) -> Option<(&Notice, Phase)> {
    self
      .elements
      .iter()
      .find(|e| e.id == id)
      .map(|e| (&e.notice, e.phase))
  }

  /// Elements in display order.
  pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Notice, Phase)> {
    self.elements.iter().map(|e| (e.id, &e.notice, e.phase))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_element_ids() {
    assert_eq!(ElementId::OfflineBanner.as_str(), "offline-banner");
    assert_eq!(ElementId::SyncBanner.as_str(), "sync-banner");
    assert_eq!(ElementId::Toast.as_str(), "toast");
  }

  #[test]
  fn test_repeated_show_reuses_element() {
    let now = Instant::now();
    let mut surface = Surface::new();
    surface.show_syncing(3, now);
    surface.show_syncing(2, now);
    surface.show_offline(now);
    surface.show_offline(now);

    assert_eq!(surface.elements().count(), 2);
    assert_eq!(
      surface.get(ElementId::SyncBanner).map(|(n, _)| n.clone()),
      Some(Notice::Syncing { remaining: 2 })
    );
  }

  #[test]
  fn test_offline_banner_fades_out() {
    let start = Instant::now();
    let mut surface = Surface::new();
    surface.show_offline(start);
    surface.tick(start + TRANSITION);
    assert_eq!(
      surface.get(ElementId::OfflineBanner).map(|(_, p)| p),
      Some(Phase::Visible)
    );

    let hidden_at = start + Duration::from_secs(10);
    surface.hide_offline(hidden_at);
    assert_eq!(
      surface.get(ElementId::OfflineBanner).map(|(_, p)| p),
      Some(Phase::Leaving)
    );

    surface.tick(hidden_at + TRANSITION);
    assert!(surface.get(ElementId::OfflineBanner).is_none());
  }

  #[test]
  fn test_banner_does_not_expire_on_its_own() {
    let start = Instant::now();
    let mut surface = Surface::new();
    surface.show_offline(start);
    surface.tick(start + Duration::from_secs(60));
    surface.tick(start + Duration::from_secs(120));
    assert!(surface.get(ElementId::OfflineBanner).is_some());
  }

  #[test]
  fn test_toast_lifecycle() {
    let start = Instant::now();
    let mut surface = Surface::new();
    surface.toast(ToastKind::Success, "Synced 2 entries", start);
    assert_eq!(surface.get(ElementId::Toast).map(|(_, p)| p), Some(Phase::Entering));

    surface.tick(start + TRANSITION);
    assert_eq!(surface.get(ElementId::Toast).map(|(_, p)| p), Some(Phase::Visible));

    surface.tick(start + TOAST_VISIBLE);
    assert_eq!(surface.get(ElementId::Toast).map(|(_, p)| p), Some(Phase::Leaving));

    surface.tick(start + TOAST_VISIBLE + TRANSITION);
    assert!(surface.get(ElementId::Toast).is_none());
  }

  #[test]
  fn test_new_toast_replaces_and_restarts() {
    let start = Instant::now();
    let mut surface = Surface::new();
    surface.toast(ToastKind::Info, "first", start);

    let later = start + Duration::from_secs(2);
    surface.toast(ToastKind::Warning, "second", later);
    surface.tick(start + TOAST_VISIBLE);

    assert_eq!(surface.elements().count(), 1);
    let (notice, phase) = surface.get(ElementId::Toast).unwrap();
    assert_eq!(phase, Phase::Visible);
    assert_eq!(
      notice,
      &Notice::Toast {
        kind: ToastKind::Warning,
        message: "second".to_string()
      }
    );
  }

  #[test]
  fn test_show_revives_leaving_banner() {
    let start = Instant::now();
    let mut surface = Surface::new();
    surface.show_offline(start);
    surface.hide_offline(start + Duration::from_millis(100));
    surface.show_offline(start + Duration::from_millis(200));
    surface.tick(start + Duration::from_secs(5));
    assert!(surface.get(ElementId::OfflineBanner).is_some());
  }
}
