//! The drain worker (§4.H): drains both lanes of every registered thread,
//! handing batches to an injected writer. Depends only on `ada-core`,
//! `ada-ring`, and `ada-registry` — never on `ada-writer` — so the writer
//! implementation stays swappable behind the [`EventSink`] seam.

mod config;
mod error;
mod metrics;
mod policy;
mod sink;
mod worker;

pub use config::DrainConfig;
pub use error::DrainError;
pub use metrics::DrainMetrics;
pub use policy::{InnerScheduler, SchedulingPolicy};
pub use sink::EventSink;
pub use worker::{DrainControl, DrainWorker};
