//! Proptest generators for property-based testing.

use proptest::prelude::*;

use catchup_core::{NodeAddress, NodeState, RequestHeader, StreamType, SyncMode, TransactionId, ViewId};

/// Generate a ViewId over the full signed range.
pub fn view_id() -> impl Strategy<Value = ViewId> {
    any::<i64>().prop_map(ViewId)
}

/// Generate a TransactionId over the full signed range.
pub fn transaction_id() -> impl Strategy<Value = TransactionId> {
    any::<i64>().prop_map(TransactionId)
}

pub fn stream_type() -> impl Strategy<Value = StreamType> {
    prop_oneof![
        Just(StreamType::Snapshot),
        Just(StreamType::Transactions),
        Just(StreamType::Events),
    ]
}

pub fn sync_mode() -> impl Strategy<Value = SyncMode> {
    prop_oneof![Just(SyncMode::Journals), Just(SyncMode::Snapshot)]
}

/// Generate a request header.
pub fn request_header() -> impl Strategy<Value = RequestHeader> {
    (view_id(), stream_type(), transaction_id())
        .prop_map(|(view, stream, tx)| RequestHeader::new(view, stream, tx))
}

/// Generate a peer record with a known sync mode.
pub fn node_state() -> impl Strategy<Value = NodeState> {
    ("[a-z]{1,12}", 1u16..=u16::MAX, 1u16..=u16::MAX, sync_mode(), transaction_id()).prop_map(
        |(host, port, sync_port, mode, tx)| {
            NodeState::new(NodeAddress::new(host, port), sync_port, mode, tx)
        },
    )
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Sync-mode bytes no executor knows how to run.
pub fn unknown_sync_mode() -> impl Strategy<Value = u8> {
    any::<u8>().prop_filter("known sync mode", |tag| SyncMode::try_from(*tag).is_err())
}
