use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageStoreError {
    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Message already exists: {0}")]
    Duplicate(String),

    #[error("Invalid message: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, MessageStoreError>;
