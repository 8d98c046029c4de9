use thiserror::Error;

/// Errors raised by [`crate::Session`] itself, as opposed to whatever a
/// wrapped crate's own error enum already reports (those are surfaced
/// unchanged via the `#[from]` variants below).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error(transparent)]
    Config(#[from] ada_config::ConfigError),
    #[error(transparent)]
    Registry(#[from] ada_registry::RegistryError),
    #[error(transparent)]
    Detail(#[from] ada_detail::DetailError),
    #[error(transparent)]
    Writer(#[from] ada_writer::WriterError),
    #[error(transparent)]
    Shutdown(#[from] ada_shutdown::ShutdownError),
}

impl From<SessionError> for ada_core::CoreError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::InvalidArgument(_) => Self::InvalidArgument,
            SessionError::Config(_) => Self::Parse,
            SessionError::Registry(inner) => inner.into(),
            SessionError::Detail(inner) => inner.into(),
            SessionError::Writer(_) => Self::IoFailure,
            SessionError::Shutdown(_) => Self::State,
        }
    }
}
