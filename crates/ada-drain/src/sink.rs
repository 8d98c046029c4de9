//! The writer seam (§4.H "Writer handoff"): the drain worker calls an
//! injected sink for each drained batch and never owns it. Kept as a
//! trait object here rather than a concrete dependency on `ada-writer` so
//! the worker can run in "drop mode" (`None`) during tests or when no
//! persistence is configured.

use ada_core::{DetailEvent, IndexEvent};
use crate::error::DrainError;

/// Accepts drained batches in arrival order. Implemented by `ada-writer`'s
/// trace writer; injected as `Option<Arc<dyn EventSink>>` so a missing
/// sink is drop-mode rather than a special case in the drain loop.
pub trait EventSink: Send + Sync {
    fn append_index(&self, events: &[IndexEvent]) -> Result<(), DrainError>;
    fn append_detail(&self, events: &[DetailEvent]) -> Result<(), DrainError>;
}
