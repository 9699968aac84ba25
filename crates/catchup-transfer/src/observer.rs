//! Observability hooks for transfer attempts.
//!
//! The executor and receiver never log directly; they report each phase to
//! an injected [`TransferObserver`]. [`TracingObserver`] turns those reports
//! into `tracing` events.

use catchup_core::{ClusterView, NodeAddress, RequestHeader, StreamType, SyncMode, TransferContext};
use catchup_store::{StoreError, StoreId};

use crate::error::TransferError;
use crate::receiver::StreamReport;

/// Receives progress and outcome reports from a transfer attempt.
///
/// All methods default to doing nothing.
pub trait TransferObserver: Send + Sync {
    /// An attempt started in `mode`.
    fn transfer_started(&self, _view: &ClusterView, _context: &TransferContext, _mode: SyncMode) {}

    /// About to open a connection for `header`.
    fn connecting(&self, _addr: &NodeAddress, _header: &RequestHeader) {}

    /// A chunk of `len` bytes was written to the sink.
    fn chunk_received(&self, _stream: StreamType, _len: usize) {}

    /// A stream reached end of stream.
    fn stream_received(&self, _addr: &NodeAddress, _report: &StreamReport) {}

    /// A stream failed.
    fn stream_failed(&self, _addr: &NodeAddress, _stream: StreamType, _error: &TransferError) {}

    /// Closing a sink failed. Does not change the stream's outcome.
    fn sink_close_failed(&self, _stream: StreamType, _error: &StoreError) {}

    /// A storage lifecycle call failed.
    fn storage_failed(&self, _operation: &str, _error: &StoreError) {}

    /// Received state was promoted to durable storage.
    fn committed(&self, _mode: SyncMode) {}

    /// Staged state was discarded.
    fn rolled_back(&self, _mode: SyncMode) {}

    /// A rollback delete failed; the store needs operator cleanup.
    fn cleanup_failed(&self, _store: &StoreId, _error: &StoreError) {}
}

/// Observer that ignores every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Observer emitting structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn transfer_started(&self, view: &ClusterView, context: &TransferContext, mode: SyncMode) {
        tracing::info!(
            view = %view.view_id,
            local = %context.transaction_id,
            peer = %context.latest_node.sync_address(),
            peer_tx = %context.latest_node.transaction_id,
            ?mode,
            "starting state transfer"
        );
    }

    fn connecting(&self, addr: &NodeAddress, header: &RequestHeader) {
        tracing::debug!(%addr, stream = %header.stream_type, header = %header.to_hex(), "requesting stream");
    }

    fn chunk_received(&self, stream: StreamType, len: usize) {
        tracing::trace!(%stream, len, "received chunk");
    }

    fn stream_received(&self, addr: &NodeAddress, report: &StreamReport) {
        tracing::info!(
            %addr,
            stream = %report.stream_type,
            bytes = report.bytes,
            chunks = report.chunks,
            digest = %report.digest.to_hex(),
            "stream received"
        );
    }

    fn stream_failed(&self, addr: &NodeAddress, stream: StreamType, error: &TransferError) {
        tracing::warn!(%addr, %stream, %error, "stream failed");
    }

    fn sink_close_failed(&self, stream: StreamType, error: &StoreError) {
        tracing::error!(%stream, %error, "failed to close sink");
    }

    fn storage_failed(&self, operation: &str, error: &StoreError) {
        tracing::warn!(operation, %error, "storage operation failed");
    }

    fn committed(&self, mode: SyncMode) {
        tracing::info!(?mode, "state transfer committed");
    }

    fn rolled_back(&self, mode: SyncMode) {
        tracing::warn!(?mode, "state transfer rolled back");
    }

    fn cleanup_failed(&self, store: &StoreId, error: &StoreError) {
        tracing::error!(%store, %error, "rollback could not delete store; manual cleanup required");
    }
}
