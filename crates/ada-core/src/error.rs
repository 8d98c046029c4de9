use thiserror::Error;

/// The language-neutral error kinds from the core design (§7): every
/// per-crate error enum in this workspace maps its variants onto one of
/// these at the API boundary, the way the teacher's `StreamError` exposes
/// `is_recoverable()`/`is_terminal()` over its own variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Null or out-of-range input at an API boundary. Surfaced, never retried.
    #[error("invalid argument")]
    InvalidArgument,
    /// Operation called in the wrong state-machine state.
    #[error("operation invalid in current state")]
    State,
    /// Ring or capacity exhausted. Recovered locally where possible.
    #[error("no space available")]
    NoSpace,
    /// Disk/OS write or rename failed.
    #[error("I/O failure")]
    IoFailure,
    /// Lifecycle misuse (start twice, stop when not started).
    #[error("not found")]
    NotFound,
    /// Idempotent repeat of an already-applied lifecycle transition.
    #[error("already done")]
    Already,
    /// Malformed config, CLI, or agent-init payload.
    #[error("parse error")]
    Parse,
}

impl CoreError {
    /// Errors that are handled locally (counters, rotation, drop-oldest) and
    /// never need to propagate to a caller as a hard failure.
    #[inline]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::NoSpace)
    }

    /// Errors that indicate the caller's current operation cannot proceed
    /// and should be surfaced rather than retried.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::State | Self::InvalidArgument | Self::Parse)
    }
}
