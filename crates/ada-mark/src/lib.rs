//! Pattern-based marking policy (§4.F): decides whether an event's
//! `(symbol, module, message)` probe should open or extend a detail window.

mod error;
mod policy;

pub use error::MarkError;
pub use policy::{MarkPolicy, MarkRule, MatchKind, MatchTarget, Probe, TriggerSpec};
