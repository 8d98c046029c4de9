//! The controller's state word (§4.G): `Idle → Open → {DumpReady, Discard}
//! → Closed → Dumped → Idle`, modeled as a single atomic word with
//! acquire/release pairs rather than a mutex, the way
//! `ringmpsc_stream::shutdown::ShutdownState` tracks its own small state
//! machine.
//!
//! `Discard` is not a state the controller ever sits in: hitting it is a
//! same-call transition straight back to a freshly re-armed `Open`, so it
//! never needs its own discriminant here — only `windows_discarded` needs
//! to observe that it happened.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DetailState {
    Idle = 0,
    Open = 1,
    DumpReady = 2,
    Closed = 3,
    Dumped = 4,
}

impl DetailState {
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Open,
            2 => Self::DumpReady,
            3 => Self::Closed,
            4 => Self::Dumped,
            _ => Self::Idle,
        }
    }
}
