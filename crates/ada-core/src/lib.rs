//! Shared types for the ADA flight-recorder core: the wire-layout event
//! structs, ring-header constants, and the error-kind vocabulary every other
//! crate in the workspace maps its own errors onto.

mod error;
mod event;

pub use error::CoreError;
pub use event::{
    DetailEvent, EventKind, FunctionId, IndexEvent, DETAIL_ARG_REGISTERS, DETAIL_EVENT_SIZE,
    INDEX_EVENT_SIZE, RING_FORMAT_VERSION, RING_MAGIC, STACK_SNAPSHOT_BYTES,
};
