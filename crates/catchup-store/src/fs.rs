//! Filesystem implementation of the storage traits.
//!
//! Layout under the storage root:
//!
//! ```text
//! tmp/                                   staging stores
//!   journal-<pid>-<n>/transactions.log
//!   journal-<pid>-<n>/events.log
//!   snapshot-<pid>-<n>.snap
//! journals/<version>-<txid>/             journal stores (zero-padded)
//!   transactions.log
//!   events.log
//!   COMMITTED                            written last by a merge
//! snapshots/<version>.snap
//! ```
//!
//! A journal store only counts as durable once its `COMMITTED` marker
//! exists, so an interrupted merge never advances the committed version.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use catchup_core::{StoreVersion, TransactionId};

use crate::error::{Result, StoreError};
use crate::traits::{
    JournalPlacement, JournalStorage, JournalStore, JournalStream, Sink, SnapshotStorage,
    SnapshotStore, StoreId,
};

const TMP_DIR: &str = "tmp";
const JOURNALS_DIR: &str = "journals";
const SNAPSHOTS_DIR: &str = "snapshots";
const COMMITTED_MARKER: &str = "COMMITTED";

/// Journal and snapshot storage rooted at a directory.
pub struct FsStorage {
    root: PathBuf,
    staging_seq: AtomicU64,
}

impl FsStorage {
    /// Open storage at `root`, creating the directory layout if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [TMP_DIR, JOURNALS_DIR, SNAPSHOTS_DIR] {
            fs::create_dir_all(root.join(dir)).await?;
        }

        Ok(Self {
            root,
            staging_seq: AtomicU64::new(0),
        })
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a store.
    pub fn path_of(&self, id: &StoreId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn staging_name(&self, prefix: &str, extension: &str) -> String {
        let n = self.staging_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{TMP_DIR}/{prefix}-{}-{n}{extension}", std::process::id())
    }

    /// Every journal store on disk as `(version, committed)`.
    async fn journal_versions(&self) -> Result<Vec<(u64, bool)>> {
        let mut versions = Vec::new();
        let mut entries = fs::read_dir(self.root.join(JOURNALS_DIR)).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some((version, _txid)) = parse_journal_name(name) else {
                tracing::warn!(name, "ignoring unrecognized entry in journal directory");
                continue;
            };
            let committed = fs::try_exists(entry.path().join(COMMITTED_MARKER)).await?;
            versions.push((version, committed));
        }

        Ok(versions)
    }
}

fn journal_name(version: StoreVersion, transaction_id: TransactionId) -> String {
    format!("{JOURNALS_DIR}/{:020}-{:020}", version.0, transaction_id.0)
}

fn parse_journal_name(name: &str) -> Option<(u64, i64)> {
    let (version, txid) = name.split_once('-')?;
    Some((version.parse().ok()?, txid.parse().ok()?))
}

fn snapshot_name(version: StoreVersion) -> String {
    format!("{SNAPSHOTS_DIR}/{:020}.snap", version.0)
}

fn map_missing(err: std::io::Error, id: &StoreId) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound(id.to_string()),
        ErrorKind::AlreadyExists => StoreError::AlreadyExists(id.to_string()),
        _ => StoreError::Io(err),
    }
}

/// Treat a missing path as already removed.
fn ignore_missing(result: std::io::Result<()>) -> Result<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => Ok(other?),
    }
}

async fn open_append(path: &Path, id: &StoreId) -> Result<Box<dyn Sink>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| map_missing(e, id))?;

    Ok(Box::new(FileSink {
        id: id.clone(),
        file: Some(file),
    }))
}

#[async_trait]
impl JournalStorage for FsStorage {
    async fn allocate_temp_store(&self) -> Result<JournalStore> {
        let id = StoreId(self.staging_name("journal", ""));
        fs::create_dir(self.path_of(&id))
            .await
            .map_err(|e| map_missing(e, &id))?;

        tracing::debug!(store = %id, "allocated staging journal store");
        Ok(JournalStore {
            id,
            placement: None,
        })
    }

    async fn allocate_store_at(&self, transaction_id: TransactionId) -> Result<JournalStore> {
        let newest = self
            .journal_versions()
            .await?
            .into_iter()
            .map(|(version, _)| version)
            .max()
            .unwrap_or(0);
        let version = StoreVersion(newest).next();

        let id = StoreId(journal_name(version, transaction_id));
        fs::create_dir(self.path_of(&id))
            .await
            .map_err(|e| map_missing(e, &id))?;

        tracing::debug!(store = %id, %version, "allocated journal store");
        Ok(JournalStore {
            id,
            placement: Some(JournalPlacement {
                version,
                transaction_id,
            }),
        })
    }

    async fn open_sink(
        &self,
        store: &JournalStore,
        stream: JournalStream,
    ) -> Result<Box<dyn Sink>> {
        let path = self.path_of(&store.id).join(stream.file_name());
        open_append(&path, &store.id).await
    }

    async fn merge_stores(&self, sources: &[JournalStore], target: &JournalStore) -> Result<()> {
        let target_dir = self.path_of(&target.id);
        if !fs::try_exists(&target_dir).await? {
            return Err(StoreError::NotFound(target.id.to_string()));
        }

        for stream in [JournalStream::TransactionCommits, JournalStream::Events] {
            let mut out = OpenOptions::new()
                .create(true)
                .append(true)
                .open(target_dir.join(stream.file_name()))
                .await?;

            for source in sources {
                let path = self.path_of(&source.id).join(stream.file_name());
                let mut input = match File::open(&path).await {
                    Ok(file) => file,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };
                tokio::io::copy(&mut input, &mut out).await?;
            }

            out.sync_all().await?;
        }

        fs::write(target_dir.join(COMMITTED_MARKER), b"").await?;
        tracing::info!(target = %target.id, sources = sources.len(), "merged journal stores");

        for source in sources {
            // The target is durable at this point; a leftover source is only garbage.
            if let Err(e) = fs::remove_dir_all(self.path_of(&source.id)).await {
                tracing::warn!(store = %source.id, error = %e, "failed to remove merged staging store");
            }
        }
        Ok(())
    }

    async fn delete_store(&self, store: &JournalStore) -> Result<()> {
        ignore_missing(fs::remove_dir_all(self.path_of(&store.id)).await)?;
        tracing::debug!(store = %store.id, "deleted journal store");
        Ok(())
    }

    async fn last_committed_version(&self) -> Result<StoreVersion> {
        let newest = self
            .journal_versions()
            .await?
            .into_iter()
            .filter(|(_, committed)| *committed)
            .map(|(version, _)| version)
            .max()
            .unwrap_or(0);
        Ok(StoreVersion(newest))
    }
}

#[async_trait]
impl SnapshotStorage for FsStorage {
    async fn allocate_temp_snapshot(&self) -> Result<SnapshotStore> {
        let id = StoreId(self.staging_name("snapshot", ".snap"));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_of(&id))
            .await
            .map_err(|e| map_missing(e, &id))?;

        Ok(SnapshotStore { id, version: None })
    }

    async fn allocate_snapshot_after(&self, version: StoreVersion) -> Result<SnapshotStore> {
        let version = version.next();
        let id = StoreId(snapshot_name(version));
        if fs::try_exists(self.path_of(&id)).await? {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        Ok(SnapshotStore {
            id,
            version: Some(version),
        })
    }

    async fn open_snapshot_sink(&self, store: &SnapshotStore) -> Result<Box<dyn Sink>> {
        open_append(&self.path_of(&store.id), &store.id).await
    }

    async fn move_snapshot(&self, temp: &SnapshotStore, target: &SnapshotStore) -> Result<()> {
        fs::rename(self.path_of(&temp.id), self.path_of(&target.id))
            .await
            .map_err(|e| map_missing(e, &temp.id))?;
        tracing::info!(from = %temp.id, to = %target.id, "installed snapshot");
        Ok(())
    }

    async fn remove_snapshot(&self, store: &SnapshotStore) -> Result<()> {
        ignore_missing(fs::remove_file(self.path_of(&store.id)).await)
    }
}

/// Append-only file sink.
struct FileSink {
    id: StoreId,
    file: Option<File>,
}

#[async_trait]
impl Sink for FileSink {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StoreError::SinkClosed(self.id.to_string()))?;
        file.write_all(data).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| StoreError::SinkClosed(self.id.to_string()))?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}
