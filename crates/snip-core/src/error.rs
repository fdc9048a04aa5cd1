use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache initialization failed: {0}")]
    Initialization(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The short code is already held by another record.
    #[error("short code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors surfaced by the allocation and resolution engine.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    /// The requested custom code is already taken.
    #[error("short code is not available: {0}")]
    CodeUnavailable(String),
    /// Every random candidate collided with an existing code.
    #[error("failed to allocate a short code after {attempts} attempts")]
    AllocationExhausted { attempts: usize },
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    /// The requested lifetime does not fit in a timestamp.
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("operation cancelled")]
    Cancelled,
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
        }
    }
}
