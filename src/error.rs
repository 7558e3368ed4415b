use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The atomic commit unit failed; nothing was applied
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    /// Notification dispatch errors (logged by the engine, never propagated)
    #[error("Notification error: {0}")]
    Notification(String),

    /// Materialized state disagrees with the update log
    #[error("Consistency violation: {0}")]
    Consistency(String),
}

impl EngineError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Storage(_) => "STORAGE_ERROR",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
            EngineError::Configuration(_) => "CONFIGURATION_ERROR",
            EngineError::TransactionFailure(_) => "TRANSACTION_FAILURE",
            EngineError::Notification(_) => "NOTIFICATION_ERROR",
            EngineError::Consistency(_) => "CONSISTENCY_VIOLATION",
        }
    }

    /// Whether the caller may safely retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::TransactionFailure(_) | EngineError::Storage(_)
        )
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for EngineError {
    fn from(err: validator::ValidationErrors) -> Self {
        EngineError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            EngineError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            EngineError::Validation("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            EngineError::TransactionFailure("test".to_string()).error_code(),
            "TRANSACTION_FAILURE"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(EngineError::TransactionFailure("commit".to_string()).is_retryable());
        assert!(EngineError::Storage("io".to_string()).is_retryable());
        assert!(!EngineError::Validation("empty title".to_string()).is_retryable());
        assert!(!EngineError::NotFound("incident".to_string()).is_retryable());
    }
}
