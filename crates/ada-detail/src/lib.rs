//! Detail-lane controller (§4.G): the windowed mark-and-discard policy that
//! decides which filled detail rings get persisted.

mod controller;
mod error;
mod metrics;
mod state;
mod window;

pub use controller::DetailController;
pub use error::DetailError;
pub use metrics::DetailMetrics;
pub use state::DetailState;
pub use window::WindowSnapshot;
