//! Lock-free SPSC ring buffers, ring pools, lanes, and thread lane sets —
//! the producer-side data plane of the flight recorder (§4.A-D).

pub mod header;
pub mod lane;
pub mod pool;
pub mod ring;

pub use header::{RingHeader, CACHE_LINE};
pub use lane::{Lane, ThreadLaneSet};
pub use pool::RingPool;
pub use ring::{Ring, RingError, RingHeaderSnapshot};
