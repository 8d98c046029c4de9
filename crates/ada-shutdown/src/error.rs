use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("shutdown already in a terminal phase")]
    State,
    #[error("writer finalize failed during shutdown: {0}")]
    WriterFailed(String),
}

impl From<ShutdownError> for ada_core::CoreError {
    fn from(e: ShutdownError) -> Self {
        match e {
            ShutdownError::State => ada_core::CoreError::State,
            ShutdownError::WriterFailed(_) => ada_core::CoreError::IoFailure,
        }
    }
}
