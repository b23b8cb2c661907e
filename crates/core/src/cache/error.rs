use thiserror::Error;

/// Errors that can occur during cache operations.
///
/// None of these ever reach a caller of the coordinator: a failing cache
/// is logged and treated as a miss.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported key pattern: {0}")]
    InvalidPattern(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
