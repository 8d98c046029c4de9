use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<ConfigError> for ada_core::CoreError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidArgument(_) => ada_core::CoreError::InvalidArgument,
            ConfigError::Parse(_) => ada_core::CoreError::Parse,
        }
    }
}
