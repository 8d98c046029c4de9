//! The trace writer (§4.I): protobuf event framing, length-delimited
//! `events.bin`, module UUID registration, and a crash-safe JSON manifest.
//! Implements `ada_drain::EventSink` so a `TraceWriter` can be injected
//! directly into a `DrainWorker`.

mod error;
mod manifest;
mod proto;
mod varint;
mod writer;

pub use error::WriterError;
pub use manifest::Manifest;
pub use proto::{event, Event, FunctionCall, FunctionReturn, SignalDelivery, TraceEnd, TraceStart};
pub use varint::{decode_varint, encode_varint};
pub use writer::{TraceWriter, TraceWriterConfig};
