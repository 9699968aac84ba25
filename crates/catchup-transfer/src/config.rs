//! Transfer configuration.

use std::time::Duration;

use crate::error::{Result, TransferError};

/// Default size of the socket read buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for transfer behavior.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Upper bound on establishing a connection to the peer.
    pub connect_timeout: Duration,
    /// Longest the peer may stay silent before the stream is abandoned.
    pub read_idle_timeout: Duration,
    /// Size of the read buffer; each filled chunk is one sink write.
    pub buffer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_idle_timeout: Duration::from_secs(30),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl TransferConfig {
    /// Reject values that would make every transfer fail or hang.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(TransferError::InvalidConfiguration(
                "connect_timeout must be non-zero".into(),
            ));
        }
        if self.read_idle_timeout.is_zero() {
            return Err(TransferError::InvalidConfiguration(
                "read_idle_timeout must be non-zero".into(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(TransferError::InvalidConfiguration(
                "buffer_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TransferConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_size, 65536);
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = TransferConfig {
            buffer_size: 0,
            ..TransferConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TransferError::InvalidConfiguration(_))
        ));

        let config = TransferConfig {
            read_idle_timeout: Duration::ZERO,
            ..TransferConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
