use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("writer failed to accept a batch: {0}")]
    WriterFailed(String),
    #[error("drain worker is not in a state that permits this operation")]
    State,
}

impl From<DrainError> for ada_core::CoreError {
    fn from(e: DrainError) -> Self {
        match e {
            DrainError::WriterFailed(_) => ada_core::CoreError::IoFailure,
            DrainError::State => ada_core::CoreError::State,
        }
    }
}
