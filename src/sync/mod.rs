//! Draining the pending queue against the remote save endpoint.

mod engine;

pub use engine::{DrainReport, SyncEngine};
