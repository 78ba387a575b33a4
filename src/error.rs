//! Error types for the nomad-prep pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PrepError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Cleaning error: {0}")]
    CleaningError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Aggregation for user '{user_id}' failed after {attempts} attempt(s): {reason}")]
    TaskFailed {
        user_id: String,
        attempts: usize,
        reason: String,
    },

    #[error("Aggregation for user '{user_id}' exceeded the {timeout_ms} ms task timeout")]
    TaskTimeout { user_id: String, timeout_ms: u64 },
}

impl From<polars::error::PolarsError> for PrepError {
    fn from(err: polars::error::PolarsError) -> Self {
        PrepError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        PrepError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrepError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PrepError = io_err.into();
        assert!(matches!(err, PrepError::IoError(_)));
    }

    #[test]
    fn test_task_failure_names_user() {
        let err = PrepError::TaskFailed {
            user_id: "d1mm9tcy42".to_string(),
            attempts: 2,
            reason: "boom".to_string(),
        };
        assert!(err.to_string().contains("d1mm9tcy42"));
        assert!(err.to_string().contains("2 attempt"));
    }
}
