//! Storage traits: the interface catch-up uses to stage and promote state.
//!
//! The transfer executor never touches files directly. It allocates stores,
//! writes incoming bytes through [`Sink`]s, then either promotes the staged
//! data (merge / move) or deletes it.

use std::fmt;

use async_trait::async_trait;
use catchup_core::{StoreVersion, TransactionId};

use crate::error::Result;

/// Opaque identity of a store, assigned by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(pub String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a non-temporary journal store sits in the journal sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JournalPlacement {
    pub version: StoreVersion,
    pub transaction_id: TransactionId,
}

/// Handle to a pair of append-only logs: transaction commits and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JournalStore {
    pub id: StoreId,
    /// `None` for temporary (staging) stores.
    pub placement: Option<JournalPlacement>,
}

impl JournalStore {
    pub fn is_temporary(&self) -> bool {
        self.placement.is_none()
    }
}

/// One of the two logs inside a [`JournalStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalStream {
    TransactionCommits,
    Events,
}

impl JournalStream {
    /// File name used by file-backed stores.
    pub const fn file_name(self) -> &'static str {
        match self {
            JournalStream::TransactionCommits => "transactions.log",
            JournalStream::Events => "events.log",
        }
    }
}

/// Handle to a single full-state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotStore {
    pub id: StoreId,
    /// `None` for temporary (staging) snapshots.
    pub version: Option<StoreVersion>,
}

impl SnapshotStore {
    pub fn is_temporary(&self) -> bool {
        self.version.is_none()
    }
}

/// Write-only destination for a store's content.
///
/// A sink holds an underlying resource (file handle, buffer reservation)
/// and must be closed exactly once, whether or not writing succeeded.
#[async_trait]
pub trait Sink: Send {
    /// Append `data` to the store.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Flush and release the underlying resource.
    ///
    /// Closing twice returns [`StoreError::SinkClosed`](crate::StoreError::SinkClosed).
    async fn close(&mut self) -> Result<()>;
}

/// Journal storage lifecycle.
#[async_trait]
pub trait JournalStorage: Send + Sync {
    /// Allocate a staging store with no position in the journal sequence.
    async fn allocate_temp_store(&self) -> Result<JournalStore>;

    /// Allocate the next journal store, starting at `transaction_id`.
    async fn allocate_store_at(&self, transaction_id: TransactionId) -> Result<JournalStore>;

    /// Open an appendable sink on one log of `store`.
    async fn open_sink(&self, store: &JournalStore, stream: JournalStream)
        -> Result<Box<dyn Sink>>;

    /// Fold `sources` into `target` as a single operation and make `target`
    /// durable. Sources are consumed.
    async fn merge_stores(&self, sources: &[JournalStore], target: &JournalStore) -> Result<()>;

    /// Delete a store and everything written to it.
    async fn delete_store(&self, store: &JournalStore) -> Result<()>;

    /// Version of the newest committed journal store.
    async fn last_committed_version(&self) -> Result<StoreVersion>;
}

/// Snapshot storage lifecycle.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Allocate a staging snapshot.
    async fn allocate_temp_snapshot(&self) -> Result<SnapshotStore>;

    /// Allocate the snapshot positioned right after `version`.
    async fn allocate_snapshot_after(&self, version: StoreVersion) -> Result<SnapshotStore>;

    /// Open an appendable sink on a snapshot.
    async fn open_snapshot_sink(&self, store: &SnapshotStore) -> Result<Box<dyn Sink>>;

    /// Promote `temp` into the place of `target`.
    async fn move_snapshot(&self, temp: &SnapshotStore, target: &SnapshotStore) -> Result<()>;

    /// Remove a snapshot.
    async fn remove_snapshot(&self, store: &SnapshotStore) -> Result<()>;
}
