use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("operation invalid in current window state")]
    State,
    #[error("I/O failure writing window metadata: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl From<DetailError> for ada_core::CoreError {
    fn from(e: DetailError) -> Self {
        match e {
            DetailError::InvalidArgument(_) => ada_core::CoreError::InvalidArgument,
            DetailError::State => ada_core::CoreError::State,
            DetailError::IoFailure(_) => ada_core::CoreError::IoFailure,
        }
    }
}
