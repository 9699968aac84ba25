//! Test fixtures and helpers.
//!
//! Common setup code for transfer integration tests.

use std::sync::{Arc, Mutex, PoisonError};

use catchup_core::{
    ClusterView, NodeAddress, RequestHeader, StreamType, SyncMode, TransactionId, TransferContext,
    ViewId,
};
use catchup_store::{MemoryStorage, StoreError, StoreId};
use catchup_transfer::{
    StorageTransfer, StreamReport, TransferConfig, TransferError, TransferObserver,
};

use crate::peer::FakePeer;

/// One report received by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    Started(SyncMode),
    Connecting(StreamType),
    Received { stream: StreamType, bytes: u64 },
    Failed(StreamType),
    SinkCloseFailed(StreamType),
    StorageFailed(String),
    Committed(SyncMode),
    RolledBack(SyncMode),
    CleanupFailed(StoreId),
}

/// Observer that records every report except individual chunks.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far, in order.
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stream types a connection was opened for, in order.
    pub fn connections(&self) -> Vec<StreamType> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Connecting(stream) => Some(stream),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ObservedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl TransferObserver for RecordingObserver {
    fn transfer_started(&self, _view: &ClusterView, _context: &TransferContext, mode: SyncMode) {
        self.push(ObservedEvent::Started(mode));
    }

    fn connecting(&self, _addr: &NodeAddress, header: &RequestHeader) {
        self.push(ObservedEvent::Connecting(header.stream_type));
    }

    fn stream_received(&self, _addr: &NodeAddress, report: &StreamReport) {
        self.push(ObservedEvent::Received {
            stream: report.stream_type,
            bytes: report.bytes,
        });
    }

    fn stream_failed(&self, _addr: &NodeAddress, stream: StreamType, _error: &TransferError) {
        self.push(ObservedEvent::Failed(stream));
    }

    fn sink_close_failed(&self, stream: StreamType, _error: &StoreError) {
        self.push(ObservedEvent::SinkCloseFailed(stream));
    }

    fn storage_failed(&self, operation: &str, _error: &StoreError) {
        self.push(ObservedEvent::StorageFailed(operation.to_string()));
    }

    fn committed(&self, mode: SyncMode) {
        self.push(ObservedEvent::Committed(mode));
    }

    fn rolled_back(&self, mode: SyncMode) {
        self.push(ObservedEvent::RolledBack(mode));
    }

    fn cleanup_failed(&self, store: &StoreId, _error: &StoreError) {
        self.push(ObservedEvent::CleanupFailed(store.clone()));
    }
}

/// In-memory storage plus a recording observer.
pub struct TestFixture {
    pub storage: MemoryStorage,
    pub observer: Arc<RecordingObserver>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::new())
    }

    pub fn with_storage(storage: MemoryStorage) -> Self {
        Self {
            storage,
            observer: Arc::new(RecordingObserver::new()),
        }
    }

    /// An executor over this fixture's storage with default settings.
    pub fn transfer(&self) -> StorageTransfer<MemoryStorage, MemoryStorage> {
        self.transfer_with(TransferConfig::default())
    }

    pub fn transfer_with(
        &self,
        config: TransferConfig,
    ) -> StorageTransfer<MemoryStorage, MemoryStorage> {
        let storage = Arc::new(self.storage.clone());
        let observer: Arc<dyn TransferObserver> = self.observer.clone();
        StorageTransfer::with_observer(Arc::clone(&storage), storage, config, observer)
            .expect("fixture config is valid")
    }

    /// Context for a node at `local` catching up from `peer`, which is at `remote`.
    pub fn context(
        &self,
        peer: &FakePeer,
        mode: SyncMode,
        local: i64,
        remote: i64,
    ) -> TransferContext {
        TransferContext::new(
            TransactionId(local),
            peer.node_state(mode, TransactionId(remote)),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A cluster view with the given id.
pub fn view(id: i64) -> ClusterView {
    ClusterView::new(ViewId(id))
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("catchup=debug")),
        )
        .try_init();
}

/// A loopback port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    listener
        .local_addr()
        .expect("listener has an address")
        .port()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catchup_transfer::CancelToken;

    use crate::peer::PeerAction;

    #[tokio::test]
    async fn test_fixture_records_rollback() {
        let fixture = TestFixture::new();
        let peer = FakePeer::start([(StreamType::Transactions, PeerAction::Reset(vec![1]))])
            .await
            .unwrap();
        let context = fixture.context(&peer, SyncMode::Journals, 1, 5);

        let ok = fixture
            .transfer()
            .attempt_transfer(&view(2), &context, &CancelToken::new())
            .await
            .unwrap();

        assert!(!ok);
        let events = fixture.observer.events();
        assert_eq!(events.first(), Some(&ObservedEvent::Started(SyncMode::Journals)));
        assert_eq!(events.last(), Some(&ObservedEvent::RolledBack(SyncMode::Journals)));
        assert_eq!(fixture.observer.connections(), vec![StreamType::Transactions]);
    }
}
