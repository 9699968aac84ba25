//! Error types for the transfer module.

use thiserror::Error;

use catchup_core::CoreError;
use catchup_store::StoreError;

/// Errors that can occur while pulling state from a peer.
///
/// Everything except [`TransferError::InvalidConfiguration`] describes a
/// failed attempt that the dispatcher may retry.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Could not open a connection to the peer.
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level error after the connection was established.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Local storage refused a write or lifecycle operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Peer did not answer in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The attempt was cancelled by the caller.
    #[error("transfer cancelled")]
    Cancelled,

    /// Caller bug: unsupported sync mode or unusable configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl TransferError {
    /// Whether re-dispatching the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransferError::InvalidConfiguration(_))
    }
}

impl From<CoreError> for TransferError {
    fn from(e: CoreError) -> Self {
        TransferError::InvalidConfiguration(e.to_string())
    }
}

/// Result type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
