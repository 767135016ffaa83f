//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use hookline_core::domain::DomainError;
use hookline_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use serde::Serialize;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const THROTTLED: i32 = 4003;
    /// Queue full; `data.retry_after_ms` says when to try again
    pub const RETRY_LATER: i32 = 4290;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const SYSTEM_ERROR: i32 = 5002;
}

/// Retry hint used when the caller supplies none
pub const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

/// `data` payload of a RETRY_LATER error
#[derive(Debug, Clone, Serialize)]
pub struct RetryLaterData {
    pub queue: String,
    pub depth: u64,
    pub max_depth: u64,
    pub retry_after_ms: u64,
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    to_rpc_error_with_retry(err, DEFAULT_RETRY_AFTER_MS)
}

/// Convert AppError, attaching `retry_after_ms` to backpressure errors
pub fn to_rpc_error_with_retry(err: AppError, retry_after_ms: u64) -> ErrorObjectOwned {
    let message = err.to_string();
    match err {
        AppError::Backpressure {
            queue,
            depth,
            max_depth,
        } => ErrorObjectOwned::owned(
            code::RETRY_LATER,
            message,
            Some(RetryLaterData {
                queue,
                depth,
                max_depth,
                retry_after_ms,
            }),
        ),
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::Domain(DomainError::UnknownQueue(_)) => {
            ErrorObjectOwned::owned(code::NOT_FOUND, message, None::<()>)
        }
        AppError::Domain(_) | AppError::Serialization(_) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, message, None::<()>)
        }
        AppError::Database(msg) => ErrorObjectOwned::owned(code::DB_ERROR, msg, None::<()>),
        AppError::Io(_) => ErrorObjectOwned::owned(code::SYSTEM_ERROR, message, None::<()>),
        AppError::Config(msg) | AppError::Internal(msg) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>)
        }
    }
}

/// Rate limit rejection
pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}
