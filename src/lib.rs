//! Top-level crate: re-exports every satellite crate's public surface and
//! wires them into [`Session`], the convenience type a real embedding
//! controller process constructs once per traced target.

mod error;
mod session;

pub use error::SessionError;
pub use session::{Session, SessionConfig};

pub use ada_config::{
    calibrate_startup_timeout, AgentInitPayload, ConfigError, RawTracerConfig, TracerConfig, TriggerConfig,
};
pub use ada_core::{
    CoreError, DetailEvent, EventKind, FunctionId, IndexEvent, DETAIL_ARG_REGISTERS, DETAIL_EVENT_SIZE,
    INDEX_EVENT_SIZE, RING_FORMAT_VERSION, RING_MAGIC, STACK_SNAPSHOT_BYTES,
};
pub use ada_detail::{DetailController, DetailError, DetailMetrics, DetailState, WindowSnapshot};
pub use ada_drain::{DrainConfig, DrainControl, DrainError, DrainMetrics, DrainWorker, EventSink, SchedulingPolicy};
pub use ada_mark::{MarkError, MarkPolicy, MarkRule, MatchKind, MatchTarget, Probe, TriggerSpec};
pub use ada_registry::{LaneSizing, RegistryError, ThreadRegistry};
pub use ada_ring::{Lane, Ring, RingError, RingHeaderSnapshot, RingPool, ThreadLaneSet, CACHE_LINE};
pub use ada_shutdown::{
    install, notify_from_signal_handler, ShutdownCoordinator, ShutdownError, ShutdownHooks, ShutdownPhase,
    ShutdownReason, ShutdownSummary,
};
pub use ada_writer::{Manifest, TraceWriter, TraceWriterConfig, WriterError};
