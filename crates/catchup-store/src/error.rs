//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store does not exist (never allocated, or already deleted).
    #[error("store not found: {0}")]
    NotFound(String),

    /// A store already occupies the requested position.
    #[error("store already exists: {0}")]
    AlreadyExists(String),

    /// Write or close on a sink that was already closed.
    #[error("sink already closed: {0}")]
    SinkClosed(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Backend refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding store state was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
