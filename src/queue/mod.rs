//! Pending time entries captured while the save endpoint is unreachable.

mod entry;
mod store;

pub use entry::{EntryError, EntryForm, Hours, PendingEntry, UNSPECIFIED};
pub use store::QueueStore;

#[cfg(test)]
pub(crate) use entry::tests as fixtures;
