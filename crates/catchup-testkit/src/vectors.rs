//! Golden request-header vectors.
//!
//! Serving peers written in any language must decode these bytes to the
//! same three values.

use catchup_core::{RequestHeader, StreamType, TransactionId, ViewId};

/// A golden header vector.
#[derive(Debug, Clone)]
pub struct HeaderVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub view_id: i64,
    pub stream_type: StreamType,
    pub transaction_id: i64,
    /// Expected encoding (hex).
    pub expected_hex: &'static str,
}

impl HeaderVector {
    pub fn header(&self) -> RequestHeader {
        RequestHeader::new(
            ViewId(self.view_id),
            self.stream_type,
            TransactionId(self.transaction_id),
        )
    }
}

/// Get all golden header vectors.
pub fn all_vectors() -> Vec<HeaderVector> {
    vec![
        HeaderVector {
            name: "events request",
            view_id: 7,
            stream_type: StreamType::Events,
            transaction_id: 42,
            expected_hex: "000000000000000702000000000000002a",
        },
        HeaderVector {
            name: "transactions request",
            view_id: 1,
            stream_type: StreamType::Transactions,
            transaction_id: 0,
            expected_hex: "0000000000000001010000000000000000",
        },
        HeaderVector {
            name: "snapshot request at view zero",
            view_id: 0,
            stream_type: StreamType::Snapshot,
            transaction_id: 255,
            expected_hex: "00000000000000000000000000000000ff",
        },
        HeaderVector {
            name: "negative ids",
            view_id: -1,
            stream_type: StreamType::Transactions,
            transaction_id: -2,
            expected_hex: "ffffffffffffffff01fffffffffffffffe",
        },
        HeaderVector {
            name: "byte order",
            view_id: 0x0102030405060708,
            stream_type: StreamType::Events,
            transaction_id: 0x1112131415161718,
            expected_hex: "0102030405060708021112131415161718",
        },
    ]
}

/// Check every vector's encoding and decoding.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        let header = vector.header();

        let encoded = header.to_hex();
        if encoded != vector.expected_hex {
            return Err(format!(
                "{}: encoded {}, expected {}",
                vector.name, encoded, vector.expected_hex
            ));
        }

        let bytes = hex::decode(vector.expected_hex)
            .map_err(|e| format!("{}: bad hex: {}", vector.name, e))?;
        let decoded = RequestHeader::decode(&bytes)
            .map_err(|e| format!("{}: decode failed: {}", vector.name, e))?;
        if decoded != header {
            return Err(format!("{}: decoded {:?}", vector.name, decoded));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_hold() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_vectors_are_header_sized() {
        for vector in all_vectors() {
            assert_eq!(vector.expected_hex.len(), 34, "{}", vector.name);
        }
    }
}
