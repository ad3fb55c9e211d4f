use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was unreachable or returned a malformed response.
    #[error("Store transport error: {0}")]
    Transport(String),

    /// A batch exceeded the store's per-call item ceiling.
    #[error("number of requests cannot exceed {max} items, got {count}")]
    Validation { count: usize, max: usize },

    #[error("Store backend not available: {0}")]
    NotConfigured(String),
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation { .. })
    }
}

/// A page payload that could not be turned into content records.
#[derive(Debug, Clone, Error)]
#[error("Failed to decode content records: {0}")]
pub struct DecodeError(pub String);

pub type StoreResult<T> = Result<T, StoreError>;
