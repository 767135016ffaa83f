// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    #[error("Invalid descriptor for queue '{queue}': {reason}")]
    InvalidDescriptor { queue: String, reason: String },

    #[error("Duplicate queue descriptor: {0}")]
    DuplicateQueue(String),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
