//! Error types for the ORM system
//!
//! Provides error handling for schema registration, pool lifecycle,
//! argument validation and statement execution.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone)]
pub enum ModelError {
    /// Schema declaration is invalid (zero or several primary keys)
    Schema(String),
    /// A query was issued before the connection pool was initialized
    PoolNotReady,
    /// The process-wide pool was initialized twice
    PoolAlreadyInitialized,
    /// Caller supplied a malformed argument (e.g. a bad `limit` shape)
    InvalidArgument(String),
    /// The database driver rejected or failed a statement
    Execution(String),
    /// Connection pool error
    Connection(String),
    /// Configuration error
    Configuration(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Transaction error
    Transaction(String),
    /// Model not found in database
    NotFound(String),
    /// Primary key is missing or invalid
    MissingPrimaryKey,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ModelError::PoolNotReady => write!(f, "Connection pool has not been initialized"),
            ModelError::PoolAlreadyInitialized => {
                write!(f, "Connection pool has already been initialized")
            }
            ModelError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ModelError::Execution(msg) => write!(f, "Execution error: {}", msg),
            ModelError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            ModelError::NotFound(table) => write!(f, "Record not found in table '{}'", table),
            ModelError::MissingPrimaryKey => write!(f, "Primary key is missing or invalid"),
        }
    }
}

impl std::error::Error for ModelError {}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Execution(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

// Infallible conversions (e.g. `u64 -> Limit`) flow through the same builders
impl From<std::convert::Infallible> for ModelError {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

impl ModelError {
    /// True for errors that indicate a programming mistake rather than a
    /// runtime condition the caller can recover from.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            ModelError::Schema(_) | ModelError::PoolNotReady | ModelError::PoolAlreadyInitialized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ModelError::Schema("Primary key not found".to_string()).to_string(),
            "Schema error: Primary key not found"
        );
        assert!(ModelError::PoolNotReady.to_string().contains("not been initialized"));
        assert!(ModelError::InvalidArgument("limit".to_string())
            .to_string()
            .starts_with("Invalid argument"));
    }

    #[test]
    fn test_programming_errors() {
        assert!(ModelError::PoolNotReady.is_programming_error());
        assert!(ModelError::Schema("dup".to_string()).is_programming_error());
        assert!(!ModelError::Execution("boom".to_string()).is_programming_error());
        assert!(!ModelError::InvalidArgument("bad".to_string()).is_programming_error());
    }

    #[test]
    fn test_sqlx_error_becomes_execution_error() {
        let err: ModelError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ModelError::Execution(_)));
    }
}
