// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Queue is saturated; the producer should retry later.
    #[error("Queue '{queue}' is full ({depth}/{max_depth}), retry later")]
    Backpressure {
        queue: String,
        depth: u64,
        max_depth: u64,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for errors a caller may retry without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Backpressure { .. } | AppError::Database(_))
    }

    /// True when the error signals admission backpressure.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, AppError::Backpressure { .. })
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_is_retryable() {
        let err = AppError::Backpressure {
            queue: "ingest".to_string(),
            depth: 3,
            max_depth: 3,
        };
        assert!(err.is_retryable());
        assert!(err.is_backpressure());
        assert!(err.to_string().contains("ingest"));
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err = AppError::Validation("bad".to_string());
        assert!(!err.is_retryable());
        assert!(!err.is_backpressure());
    }
}
