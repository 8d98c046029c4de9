use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("module table is full")]
    NoSpace,
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl From<WriterError> for ada_core::CoreError {
    fn from(e: WriterError) -> Self {
        match e {
            WriterError::InvalidArgument(_) => ada_core::CoreError::InvalidArgument,
            WriterError::NoSpace => ada_core::CoreError::NoSpace,
            WriterError::IoFailure(_) => ada_core::CoreError::IoFailure,
        }
    }
}
