//! Saved, not-yet-submitted entry form.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::warn;

use crate::kv::{KeyValueStore, ENTRY_DRAFT_KEY};
use crate::queue::EntryForm;

pub struct DraftStore<S: KeyValueStore> {
  kv: Arc<S>,
}

impl<S: KeyValueStore> DraftStore<S> {
  pub fn new(kv: Arc<S>) -> Self {
    Self { kv }
  }

  pub fn save(&self, form: &EntryForm) -> Result<()> {
    let json =
      serde_json::to_string(form).map_err(|e| eyre!("Failed to serialize draft: {}", e))?;
    self.kv.set(ENTRY_DRAFT_KEY, &json)
  }

  /// Load the draft; a draft that no longer parses is discarded.
  pub fn load(&self) -> Option<EntryForm> {
    let raw = match self.kv.get(ENTRY_DRAFT_KEY) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(error = %e, "failed to read entry draft");
        return None;
      }
    };

    match serde_json::from_str::<EntryForm>(&raw) {
      Ok(form) if !form.is_empty() => Some(form),
      Ok(_) => None,
      Err(e) => {
        warn!(error = %e, "entry draft is corrupt, discarding it");
        if let Err(e) = self.kv.remove(ENTRY_DRAFT_KEY) {
          warn!(error = %e, "failed to discard corrupt entry draft");
        }
        None
      }
    }
  }

  pub fn clear(&self) -> Result<()> {
    self.kv.remove(ENTRY_DRAFT_KEY)
  }
}
