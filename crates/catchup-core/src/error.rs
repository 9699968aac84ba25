//! Error types for the catch-up core.

use thiserror::Error;

/// Errors raised while interpreting catch-up primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("request header too short: expected {expected} bytes, got {got}")]
    HeaderTooShort { expected: usize, got: usize },

    #[error("unknown stream type: {0}")]
    UnknownStreamType(u8),

    #[error("unknown sync mode tag: {0}")]
    UnknownSyncMode(u8),
}
