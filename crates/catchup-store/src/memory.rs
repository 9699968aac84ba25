//! In-memory implementation of the storage traits.
//!
//! This is primarily for testing. It follows the same lifecycle rules as
//! [`FsStorage`](crate::FsStorage) but keeps everything in memory, records
//! every lifecycle call, and can be told to fail specific operations.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use catchup_core::{StoreVersion, TransactionId};

use crate::error::{Result, StoreError};
use crate::traits::{
    JournalPlacement, JournalStorage, JournalStore, JournalStream, Sink, SnapshotStorage,
    SnapshotStore, StoreId,
};

/// Lifecycle state of a store held by [`MemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Staging store, not visible as durable state.
    Temporary,
    /// Target store allocated but not yet committed into.
    Allocated,
    /// Durable.
    Committed,
    /// Staging store folded into a committed store.
    Consumed,
    /// Deleted or removed.
    Deleted,
}

/// Operations [`MemoryStorage`] should refuse.
#[derive(Debug, Clone, Default)]
pub struct MemoryFaults {
    pub fail_allocation: bool,
    pub fail_sink_writes: bool,
    pub fail_sink_close: bool,
    pub fail_merge: bool,
    pub fail_move: bool,
    pub fail_delete: bool,
}

/// Every lifecycle call observed by [`MemoryStorage`], in call order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub allocations: Vec<StoreId>,
    pub merges: Vec<(Vec<StoreId>, StoreId)>,
    pub deletes: Vec<StoreId>,
    pub moves: Vec<(StoreId, StoreId)>,
    pub removals: Vec<StoreId>,
    pub sinks_opened: usize,
    pub sinks_closed: usize,
}

/// In-memory journal and snapshot storage.
///
/// Cloning yields another handle to the same storage.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    next_id: u64,
    /// Highest journal version handed out so far.
    assigned_version: u64,
    /// Committed version the storage was seeded with.
    base_version: u64,
    journals: BTreeMap<StoreId, JournalEntry>,
    snapshots: BTreeMap<StoreId, SnapshotEntry>,
    faults: MemoryFaults,
    calls: CallLog,
}

struct JournalEntry {
    handle: JournalStore,
    state: StoreState,
    transactions: BytesMut,
    events: BytesMut,
}

impl JournalEntry {
    fn log_mut(&mut self, stream: JournalStream) -> &mut BytesMut {
        match stream {
            JournalStream::TransactionCommits => &mut self.transactions,
            JournalStream::Events => &mut self.events,
        }
    }
}

struct SnapshotEntry {
    handle: SnapshotStore,
    state: StoreState,
    data: BytesMut,
}

fn is_live(state: StoreState) -> bool {
    matches!(
        state,
        StoreState::Temporary | StoreState::Allocated | StoreState::Committed
    )
}

fn write_lock(lock: &RwLock<MemoryStorageInner>) -> Result<RwLockWriteGuard<'_, MemoryStorageInner>> {
    lock.write()
        .map_err(|e| StoreError::LockPoisoned(e.to_string()))
}

impl MemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage whose newest committed journal is at `version`.
    pub fn with_committed_version(version: StoreVersion) -> Self {
        let storage = Self::new();
        {
            let mut inner = storage.inner_mut();
            inner.base_version = version.0;
            inner.assigned_version = version.0;
        }
        storage
    }

    /// Replace the set of injected faults.
    pub fn set_faults(&self, faults: MemoryFaults) {
        self.inner_mut().faults = faults;
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> CallLog {
        self.inner_ref().calls.clone()
    }

    /// State of a journal store, if it was ever allocated.
    pub fn journal_state(&self, id: &StoreId) -> Option<StoreState> {
        self.inner_ref().journals.get(id).map(|e| e.state)
    }

    /// State of a snapshot store, if it was ever allocated.
    pub fn snapshot_state(&self, id: &StoreId) -> Option<StoreState> {
        self.inner_ref().snapshots.get(id).map(|e| e.state)
    }

    /// Bytes written to one log of a journal store.
    pub fn journal_contents(&self, id: &StoreId, stream: JournalStream) -> Option<Bytes> {
        let inner = self.inner_ref();
        inner.journals.get(id).map(|e| match stream {
            JournalStream::TransactionCommits => Bytes::copy_from_slice(&e.transactions),
            JournalStream::Events => Bytes::copy_from_slice(&e.events),
        })
    }

    /// Bytes written to a snapshot store.
    pub fn snapshot_contents(&self, id: &StoreId) -> Option<Bytes> {
        self.inner_ref()
            .snapshots
            .get(id)
            .map(|e| Bytes::copy_from_slice(&e.data))
    }

    /// Stores that are neither committed nor cleaned up.
    pub fn pending_stores(&self) -> Vec<StoreId> {
        let inner = self.inner_ref();
        let pending = |state: StoreState| {
            matches!(state, StoreState::Temporary | StoreState::Allocated)
        };

        inner
            .journals
            .iter()
            .filter(|(_, e)| pending(e.state))
            .map(|(id, _)| id.clone())
            .chain(
                inner
                    .snapshots
                    .iter()
                    .filter(|(_, e)| pending(e.state))
                    .map(|(id, _)| id.clone()),
            )
            .collect()
    }

    // Inspection helpers recover from poisoning: a panicking test thread
    // must not hide the state it left behind.
    fn inner_ref(&self) -> RwLockReadGuard<'_, MemoryStorageInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn inner_mut(&self) -> RwLockWriteGuard<'_, MemoryStorageInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(inner: &mut MemoryStorageInner, prefix: &str) -> Result<StoreId> {
        if inner.faults.fail_allocation {
            return Err(StoreError::Unavailable(format!("allocation of {prefix} refused")));
        }
        inner.next_id += 1;
        let id = StoreId(format!("{}-{}", prefix, inner.next_id));
        inner.calls.allocations.push(id.clone());
        Ok(id)
    }

    fn sink(&self, target: SinkTarget) -> Box<dyn Sink> {
        Box::new(MemorySink {
            inner: Arc::clone(&self.inner),
            target,
            closed: false,
        })
    }
}

#[async_trait]
impl JournalStorage for MemoryStorage {
    async fn allocate_temp_store(&self) -> Result<JournalStore> {
        let mut inner = write_lock(&self.inner)?;
        let id = Self::allocate_id(&mut inner, "journal-tmp")?;

        let handle = JournalStore {
            id: id.clone(),
            placement: None,
        };
        inner.journals.insert(
            id,
            JournalEntry {
                handle: handle.clone(),
                state: StoreState::Temporary,
                transactions: BytesMut::new(),
                events: BytesMut::new(),
            },
        );
        Ok(handle)
    }

    async fn allocate_store_at(&self, transaction_id: TransactionId) -> Result<JournalStore> {
        let mut inner = write_lock(&self.inner)?;
        let id = Self::allocate_id(&mut inner, "journal")?;
        inner.assigned_version += 1;

        let handle = JournalStore {
            id: id.clone(),
            placement: Some(JournalPlacement {
                version: StoreVersion(inner.assigned_version),
                transaction_id,
            }),
        };
        inner.journals.insert(
            id,
            JournalEntry {
                handle: handle.clone(),
                state: StoreState::Allocated,
                transactions: BytesMut::new(),
                events: BytesMut::new(),
            },
        );
        Ok(handle)
    }

    async fn open_sink(
        &self,
        store: &JournalStore,
        stream: JournalStream,
    ) -> Result<Box<dyn Sink>> {
        let mut inner = write_lock(&self.inner)?;
        match inner.journals.get(&store.id) {
            Some(entry) if is_live(entry.state) => {}
            _ => return Err(StoreError::NotFound(store.id.to_string())),
        }
        inner.calls.sinks_opened += 1;
        drop(inner);

        Ok(self.sink(SinkTarget::Journal(store.id.clone(), stream)))
    }

    async fn merge_stores(&self, sources: &[JournalStore], target: &JournalStore) -> Result<()> {
        let mut inner = write_lock(&self.inner)?;
        inner.calls.merges.push((
            sources.iter().map(|s| s.id.clone()).collect(),
            target.id.clone(),
        ));

        if inner.faults.fail_merge {
            return Err(StoreError::Unavailable("merge refused".into()));
        }

        match inner.journals.get(&target.id) {
            Some(entry) if matches!(entry.state, StoreState::Allocated | StoreState::Committed) => {}
            _ => return Err(StoreError::NotFound(target.id.to_string())),
        }
        for source in sources {
            match inner.journals.get(&source.id) {
                Some(entry) if entry.state == StoreState::Temporary => {}
                _ => return Err(StoreError::NotFound(source.id.to_string())),
            }
        }

        let mut transactions = BytesMut::new();
        let mut events = BytesMut::new();
        for source in sources {
            if let Some(entry) = inner.journals.get_mut(&source.id) {
                transactions.extend_from_slice(&entry.transactions);
                events.extend_from_slice(&entry.events);
                entry.state = StoreState::Consumed;
            }
        }

        if let Some(entry) = inner.journals.get_mut(&target.id) {
            entry.transactions.extend_from_slice(&transactions);
            entry.events.extend_from_slice(&events);
            entry.state = StoreState::Committed;
        }
        Ok(())
    }

    async fn delete_store(&self, store: &JournalStore) -> Result<()> {
        let mut inner = write_lock(&self.inner)?;
        inner.calls.deletes.push(store.id.clone());

        if inner.faults.fail_delete {
            return Err(StoreError::Unavailable(format!("delete of {} refused", store.id)));
        }

        let entry = inner
            .journals
            .get_mut(&store.id)
            .ok_or_else(|| StoreError::NotFound(store.id.to_string()))?;
        entry.state = StoreState::Deleted;
        entry.transactions.clear();
        entry.events.clear();
        Ok(())
    }

    async fn last_committed_version(&self) -> Result<StoreVersion> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;

        let newest = inner
            .journals
            .values()
            .filter(|e| e.state == StoreState::Committed)
            .filter_map(|e| e.handle.placement.map(|p| p.version.0))
            .max()
            .unwrap_or(0);

        Ok(StoreVersion(newest.max(inner.base_version)))
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn allocate_temp_snapshot(&self) -> Result<SnapshotStore> {
        let mut inner = write_lock(&self.inner)?;
        let id = Self::allocate_id(&mut inner, "snapshot-tmp")?;

        let handle = SnapshotStore {
            id: id.clone(),
            version: None,
        };
        inner.snapshots.insert(
            id,
            SnapshotEntry {
                handle: handle.clone(),
                state: StoreState::Temporary,
                data: BytesMut::new(),
            },
        );
        Ok(handle)
    }

    async fn allocate_snapshot_after(&self, version: StoreVersion) -> Result<SnapshotStore> {
        let mut inner = write_lock(&self.inner)?;
        let target = version.next();

        let taken = inner
            .snapshots
            .values()
            .any(|e| e.handle.version == Some(target) && is_live(e.state));
        if taken {
            return Err(StoreError::AlreadyExists(format!("snapshot {target}")));
        }

        let id = Self::allocate_id(&mut inner, "snapshot")?;
        let handle = SnapshotStore {
            id: id.clone(),
            version: Some(target),
        };
        inner.snapshots.insert(
            id,
            SnapshotEntry {
                handle: handle.clone(),
                state: StoreState::Allocated,
                data: BytesMut::new(),
            },
        );
        Ok(handle)
    }

    async fn open_snapshot_sink(&self, store: &SnapshotStore) -> Result<Box<dyn Sink>> {
        let mut inner = write_lock(&self.inner)?;
        match inner.snapshots.get(&store.id) {
            Some(entry) if is_live(entry.state) => {}
            _ => return Err(StoreError::NotFound(store.id.to_string())),
        }
        inner.calls.sinks_opened += 1;
        drop(inner);

        Ok(self.sink(SinkTarget::Snapshot(store.id.clone())))
    }

    async fn move_snapshot(&self, temp: &SnapshotStore, target: &SnapshotStore) -> Result<()> {
        let mut inner = write_lock(&self.inner)?;
        inner.calls.moves.push((temp.id.clone(), target.id.clone()));

        if inner.faults.fail_move {
            return Err(StoreError::Unavailable("move refused".into()));
        }

        let data = match inner.snapshots.get_mut(&temp.id) {
            Some(entry) if entry.state == StoreState::Temporary => {
                entry.state = StoreState::Consumed;
                entry.data.split()
            }
            _ => return Err(StoreError::NotFound(temp.id.to_string())),
        };

        match inner.snapshots.get_mut(&target.id) {
            Some(entry) if entry.state == StoreState::Allocated => {
                entry.data = data;
                entry.state = StoreState::Committed;
                Ok(())
            }
            _ => Err(StoreError::NotFound(target.id.to_string())),
        }
    }

    async fn remove_snapshot(&self, store: &SnapshotStore) -> Result<()> {
        let mut inner = write_lock(&self.inner)?;
        inner.calls.removals.push(store.id.clone());

        if inner.faults.fail_delete {
            return Err(StoreError::Unavailable(format!("removal of {} refused", store.id)));
        }

        let entry = inner
            .snapshots
            .get_mut(&store.id)
            .ok_or_else(|| StoreError::NotFound(store.id.to_string()))?;
        entry.state = StoreState::Deleted;
        entry.data.clear();
        Ok(())
    }
}

enum SinkTarget {
    Journal(StoreId, JournalStream),
    Snapshot(StoreId),
}

impl SinkTarget {
    fn id(&self) -> &StoreId {
        match self {
            SinkTarget::Journal(id, _) | SinkTarget::Snapshot(id) => id,
        }
    }
}

/// Sink appending into a [`MemoryStorage`] buffer.
struct MemorySink {
    inner: Arc<RwLock<MemoryStorageInner>>,
    target: SinkTarget,
    closed: bool,
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(StoreError::SinkClosed(self.target.id().to_string()));
        }

        let mut inner = write_lock(&self.inner)?;
        if inner.faults.fail_sink_writes {
            return Err(StoreError::Unavailable(format!(
                "write to {} refused",
                self.target.id()
            )));
        }

        let buffer = match &self.target {
            SinkTarget::Journal(id, stream) => inner
                .journals
                .get_mut(id)
                .filter(|e| is_live(e.state))
                .map(|e| e.log_mut(*stream)),
            SinkTarget::Snapshot(id) => inner
                .snapshots
                .get_mut(id)
                .filter(|e| is_live(e.state))
                .map(|e| &mut e.data),
        };

        match buffer {
            Some(buffer) => {
                buffer.extend_from_slice(data);
                Ok(())
            }
            None => Err(StoreError::NotFound(self.target.id().to_string())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(StoreError::SinkClosed(self.target.id().to_string()));
        }
        self.closed = true;

        let mut inner = write_lock(&self.inner)?;
        inner.calls.sinks_closed += 1;

        if inner.faults.fail_sink_close {
            return Err(StoreError::Unavailable(format!(
                "close of {} failed",
                self.target.id()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_journal_merge_commits_target() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_store().await.unwrap();
        let target = storage.allocate_store_at(TransactionId(10)).await.unwrap();
        assert!(temp.is_temporary());
        assert_eq!(target.placement.unwrap().version, StoreVersion(1));

        let mut sink = storage
            .open_sink(&temp, JournalStream::TransactionCommits)
            .await
            .unwrap();
        sink.write(b"abc").await.unwrap();
        sink.close().await.unwrap();

        storage.merge_stores(&[temp.clone()], &target).await.unwrap();

        assert_eq!(storage.journal_state(&temp.id), Some(StoreState::Consumed));
        assert_eq!(storage.journal_state(&target.id), Some(StoreState::Committed));
        assert_eq!(
            storage
                .journal_contents(&target.id, JournalStream::TransactionCommits)
                .unwrap(),
            Bytes::from_static(b"abc")
        );
        assert_eq!(
            storage.last_committed_version().await.unwrap(),
            StoreVersion(1)
        );
        assert!(storage.pending_stores().is_empty());
    }

    #[tokio::test]
    async fn test_sink_close_twice_is_rejected() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let mut sink = storage.open_snapshot_sink(&temp).await.unwrap();

        sink.close().await.unwrap();
        assert!(matches!(sink.close().await, Err(StoreError::SinkClosed(_))));
        assert!(matches!(sink.write(b"x").await, Err(StoreError::SinkClosed(_))));

        let calls = storage.calls();
        assert_eq!(calls.sinks_opened, 1);
        assert_eq!(calls.sinks_closed, 1);
    }

    #[tokio::test]
    async fn test_write_after_delete_fails() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_store().await.unwrap();
        let mut sink = storage.open_sink(&temp, JournalStream::Events).await.unwrap();

        storage.delete_store(&temp).await.unwrap();
        assert!(matches!(sink.write(b"late").await, Err(StoreError::NotFound(_))));
        assert_eq!(storage.journal_state(&temp.id), Some(StoreState::Deleted));
    }

    #[tokio::test]
    async fn test_snapshot_positioned_after_committed_version() {
        let storage = MemoryStorage::with_committed_version(StoreVersion(7));
        let version = storage.last_committed_version().await.unwrap();
        let target = storage.allocate_snapshot_after(version).await.unwrap();
        assert_eq!(target.version, Some(StoreVersion(8)));

        let again = storage.allocate_snapshot_after(version).await;
        assert!(matches!(again, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_snapshot_move() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let target = storage
            .allocate_snapshot_after(StoreVersion(0))
            .await
            .unwrap();

        let mut sink = storage.open_snapshot_sink(&temp).await.unwrap();
        sink.write(b"state").await.unwrap();
        sink.close().await.unwrap();

        storage.move_snapshot(&temp, &target).await.unwrap();
        assert_eq!(
            storage.snapshot_contents(&target.id).unwrap(),
            Bytes::from_static(b"state")
        );
        assert_eq!(storage.snapshot_state(&temp.id), Some(StoreState::Consumed));
        assert_eq!(storage.calls().moves.len(), 1);
    }

    #[tokio::test]
    async fn test_faults_are_reported_and_logged() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_store().await.unwrap();
        storage.set_faults(MemoryFaults {
            fail_delete: true,
            ..MemoryFaults::default()
        });

        assert!(matches!(
            storage.delete_store(&temp).await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(storage.calls().deletes, vec![temp.id.clone()]);
        assert_eq!(storage.pending_stores(), vec![temp.id]);
    }
}
