//! Configuration parsing and validation (§6): the recognized tracer
//! options, the agent-init payload, startup timeout calibration, and the
//! `triggers[]` grammar. Pure data in, pure data out — no CLI surface,
//! no file or environment access beyond the lookup functions callers pass
//! in explicitly.

mod agent_init;
mod error;
mod timeout;
mod tracer_config;
mod trigger;

pub use agent_init::AgentInitPayload;
pub use error::ConfigError;
pub use timeout::calibrate_startup_timeout;
pub use tracer_config::{RawTracerConfig, TracerConfig};
pub use trigger::TriggerConfig;
