//! The shutdown coordinator (§4.J): a phased
//! `IDLE → SIGNAL_RECEIVED → DRAINING → FSYNCING → COMPLETED` sequence that
//! stops producers, forces a final drain, fsyncs and finalizes the trace
//! writer, and reports a one-shot human-readable summary. Exactly one
//! caller — signal handler or explicit API call — drives the sequence;
//! every other caller's request just updates bookkeeping.

mod coordinator;
mod error;
mod phase;
mod summary;

pub use coordinator::{install, notify_from_signal_handler, ShutdownCoordinator, ShutdownHooks};
pub use error::ShutdownError;
pub use phase::{ShutdownPhase, ShutdownReason};
pub use summary::ShutdownSummary;
