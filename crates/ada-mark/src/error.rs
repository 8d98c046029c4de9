use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MarkError {
    #[error("trigger spec missing required field: {field}")]
    MissingField { field: &'static str },
}
