//! Transfer executor: picks the sync mode, pulls the streams, and commits or
//! rolls back.
//!
//! ```text
//!               ┌── Journals ──> transactions ─ok─> events ─ok─> merge ──> true
//! select mode ──┤                     │fail            │fail       │fail
//!               │                     └────────────────┴───────────┴──> delete temp + target ──> false
//!               │
//!               └── Snapshot ──> snapshot ─ok─> move ──> true
//!                                   │fail        │fail
//!                                   └────────────┴──> remove temp + target ──> false
//! ```
//!
//! Every store the executor allocates is either promoted or deleted before
//! it returns. Rollback deletes are best-effort: a failure is reported to
//! the observer and the store is left for operator cleanup.
//!
//! # Precondition
//!
//! The caller must hold an exclusive claim on the target position (the
//! journal store at the peer's transaction id, or the snapshot after the
//! last committed version). Two concurrent attempts must never aim at the
//! same target; the executor does not check this.

use std::sync::Arc;

use async_trait::async_trait;

use catchup_core::{
    ClusterView, NodeAddress, RequestHeader, StreamType, SyncMode, TransferContext,
};
use catchup_store::{JournalStorage, JournalStore, JournalStream, SnapshotStorage, SnapshotStore};

use crate::cancel::CancelToken;
use crate::config::TransferConfig;
use crate::error::{Result, TransferError};
use crate::observer::{TracingObserver, TransferObserver};
use crate::receiver::{StreamReceiver, StreamReport};

/// An operation the cluster dispatch layer can run against a view.
#[async_trait]
pub trait ClusterExecutor<C: Send + 'static>: Send + Sync {
    type Output: Send;

    async fn execute(&self, view: &ClusterView, context: C) -> Result<Self::Output>;
}

/// Pulls journals or a snapshot from a peer into local storage.
pub struct StorageTransfer<J, S> {
    journals: Arc<J>,
    snapshots: Arc<S>,
    receiver: StreamReceiver,
    observer: Arc<dyn TransferObserver>,
}

impl<J: JournalStorage, S: SnapshotStorage> StorageTransfer<J, S> {
    /// Create an executor reporting through [`TracingObserver`].
    pub fn new(journals: Arc<J>, snapshots: Arc<S>, config: TransferConfig) -> Result<Self> {
        Self::with_observer(journals, snapshots, config, Arc::new(TracingObserver))
    }

    /// Create an executor reporting through `observer`.
    pub fn with_observer(
        journals: Arc<J>,
        snapshots: Arc<S>,
        config: TransferConfig,
        observer: Arc<dyn TransferObserver>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            journals,
            snapshots,
            receiver: StreamReceiver::new(config, Arc::clone(&observer)),
            observer,
        })
    }

    /// Run one transfer attempt.
    ///
    /// Returns `Ok(true)` once the received state is durable and `Ok(false)`
    /// when the attempt failed and was rolled back. The only error is
    /// [`TransferError::InvalidConfiguration`] for a sync mode this executor
    /// does not know; no storage is touched in that case.
    pub async fn attempt_transfer(
        &self,
        view: &ClusterView,
        context: &TransferContext,
        cancel: &CancelToken,
    ) -> Result<bool> {
        let mode = context.latest_node.mode()?;
        self.observer.transfer_started(view, context, mode);

        let addr = context.latest_node.sync_address();
        let succeeded = match mode {
            SyncMode::Journals => self.transfer_journals(view, context, &addr, cancel).await,
            SyncMode::Snapshot => self.transfer_snapshot(view, context, &addr, cancel).await,
        };
        Ok(succeeded)
    }

    async fn transfer_journals(
        &self,
        view: &ClusterView,
        context: &TransferContext,
        addr: &NodeAddress,
        cancel: &CancelToken,
    ) -> bool {
        let temp = match self.journals.allocate_temp_store().await {
            Ok(store) => store,
            Err(e) => {
                self.observer.storage_failed("allocate staging journal store", &e);
                return false;
            }
        };

        let target = match self
            .journals
            .allocate_store_at(context.latest_node.transaction_id)
            .await
        {
            Ok(store) => store,
            Err(e) => {
                self.observer.storage_failed("allocate journal store", &e);
                self.delete_journal(&temp).await;
                self.observer.rolled_back(SyncMode::Journals);
                return false;
            }
        };

        // Events are only requested once the transactions arrived intact.
        let received = self
            .receive_journal(view, context, addr, &temp, JournalStream::TransactionCommits, cancel)
            .await
            .is_ok()
            && self
                .receive_journal(view, context, addr, &temp, JournalStream::Events, cancel)
                .await
                .is_ok();

        if received {
            match self
                .journals
                .merge_stores(std::slice::from_ref(&temp), &target)
                .await
            {
                Ok(()) => {
                    self.observer.committed(SyncMode::Journals);
                    return true;
                }
                Err(e) => self.observer.storage_failed("merge journal stores", &e),
            }
        }

        self.delete_journal(&temp).await;
        self.delete_journal(&target).await;
        self.observer.rolled_back(SyncMode::Journals);
        false
    }

    async fn receive_journal(
        &self,
        view: &ClusterView,
        context: &TransferContext,
        addr: &NodeAddress,
        store: &JournalStore,
        stream: JournalStream,
        cancel: &CancelToken,
    ) -> Result<StreamReport> {
        let stream_type = match stream {
            JournalStream::TransactionCommits => StreamType::Transactions,
            JournalStream::Events => StreamType::Events,
        };

        let sink = match self.journals.open_sink(store, stream).await {
            Ok(sink) => sink,
            Err(e) => {
                let e = TransferError::from(e);
                self.observer.stream_failed(addr, stream_type, &e);
                return Err(e);
            }
        };

        let header = RequestHeader::new(view.view_id, stream_type, context.transaction_id);
        self.receiver.receive(addr, header, sink, cancel).await
    }

    async fn transfer_snapshot(
        &self,
        view: &ClusterView,
        context: &TransferContext,
        addr: &NodeAddress,
        cancel: &CancelToken,
    ) -> bool {
        let temp = match self.snapshots.allocate_temp_snapshot().await {
            Ok(store) => store,
            Err(e) => {
                self.observer.storage_failed("allocate staging snapshot", &e);
                return false;
            }
        };

        let target = match self.journals.last_committed_version().await {
            Ok(version) => self.snapshots.allocate_snapshot_after(version).await,
            Err(e) => Err(e),
        };
        let target = match target {
            Ok(store) => store,
            Err(e) => {
                self.observer.storage_failed("allocate snapshot", &e);
                self.remove_snapshot(&temp).await;
                self.observer.rolled_back(SyncMode::Snapshot);
                return false;
            }
        };

        let header = RequestHeader::new(view.view_id, StreamType::Snapshot, context.transaction_id);
        let received = match self.snapshots.open_snapshot_sink(&temp).await {
            Ok(sink) => self.receiver.receive(addr, header, sink, cancel).await.is_ok(),
            Err(e) => {
                self.observer
                    .stream_failed(addr, StreamType::Snapshot, &TransferError::from(e));
                false
            }
        };

        if received {
            match self.snapshots.move_snapshot(&temp, &target).await {
                Ok(()) => {
                    self.observer.committed(SyncMode::Snapshot);
                    return true;
                }
                Err(e) => self.observer.storage_failed("move snapshot", &e),
            }
        }

        self.remove_snapshot(&temp).await;
        self.remove_snapshot(&target).await;
        self.observer.rolled_back(SyncMode::Snapshot);
        false
    }

    async fn delete_journal(&self, store: &JournalStore) {
        if let Err(e) = self.journals.delete_store(store).await {
            self.observer.cleanup_failed(&store.id, &e);
        }
    }

    async fn remove_snapshot(&self, store: &SnapshotStore) {
        if let Err(e) = self.snapshots.remove_snapshot(store).await {
            self.observer.cleanup_failed(&store.id, &e);
        }
    }
}

#[async_trait]
impl<J, S> ClusterExecutor<TransferContext> for StorageTransfer<J, S>
where
    J: JournalStorage,
    S: SnapshotStorage,
{
    type Output = bool;

    async fn execute(&self, view: &ClusterView, context: TransferContext) -> Result<bool> {
        self.attempt_transfer(view, &context, &CancelToken::new())
            .await
    }
}
