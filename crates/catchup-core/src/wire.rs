//! State-transfer request codec.
//!
//! Every transfer connection starts with one fixed-size request header and
//! nothing else:
//!
//! ```text
//! 0               8   9               17
//! +---------------+---+---------------+
//! |   view id     | t | transaction id|
//! |  i64 (BE)     |u8 |   i64 (BE)    |
//! +---------------+---+---------------+
//! ```
//!
//! There is no length prefix and no response header. The serving peer
//! writes the raw payload and closes the connection; end of connection is
//! end of stream.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::{TransactionId, ViewId};

/// Size of an encoded [`RequestHeader`].
pub const HEADER_LEN: usize = 17;

/// Which byte stream a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamType {
    /// A full snapshot.
    Snapshot = 0,
    /// The transaction commit log.
    Transactions = 1,
    /// The derived event log.
    Events = 2,
}

impl StreamType {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            StreamType::Snapshot => "snapshot",
            StreamType::Transactions => "transactions",
            StreamType::Events => "events",
        }
    }
}

impl TryFrom<u8> for StreamType {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StreamType::Snapshot),
            1 => Ok(StreamType::Transactions),
            2 => Ok(StreamType::Events),
            other => Err(CoreError::UnknownStreamType(other)),
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The request a lagging node sends on each transfer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    /// Cluster view the requester is in.
    pub view_id: ViewId,
    /// Requested stream.
    pub stream_type: StreamType,
    /// The requester's current transaction id.
    pub transaction_id: TransactionId,
}

impl RequestHeader {
    pub const fn new(view_id: ViewId, stream_type: StreamType, transaction_id: TransactionId) -> Self {
        Self {
            view_id,
            stream_type,
            transaction_id,
        }
    }

    /// Encode into the fixed 17-byte, big-endian layout.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut buf = &mut out[..];
        buf.put_i64(self.view_id.0);
        buf.put_u8(self.stream_type.as_u8());
        buf.put_i64(self.transaction_id.0);
        out
    }

    /// Decode a header from the first [`HEADER_LEN`] bytes of `bytes`.
    ///
    /// Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < HEADER_LEN {
            return Err(CoreError::HeaderTooShort {
                expected: HEADER_LEN,
                got: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_LEN];
        let view_id = ViewId(buf.get_i64());
        let stream_type = StreamType::try_from(buf.get_u8())?;
        let transaction_id = TransactionId(buf.get_i64());

        Ok(Self {
            view_id,
            stream_type,
            transaction_id,
        })
    }

    /// Hex rendering of the encoded header, for logs and test vectors.
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }
}
