use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry is at capacity ({capacity} slots claimed)")]
    CapacityExceeded { capacity: u32 },
    #[error("no thread registered at that slot index")]
    NotFound,
}

impl From<RegistryError> for ada_core::CoreError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::CapacityExceeded { .. } => ada_core::CoreError::NoSpace,
            RegistryError::NotFound => ada_core::CoreError::NotFound,
        }
    }
}
