//! # Catch-up
//!
//! State transfer for a replicated transaction engine: a node that fell
//! behind pulls durable state from a peer that is ahead and commits it
//! atomically.
//!
//! ## Overview
//!
//! - **Journals mode**: the peer streams its transaction-commit log, then
//!   its event log; both are staged and merged into a new journal store.
//! - **Snapshot mode**: the peer streams a full snapshot, which is staged
//!   and moved into place after the newest committed version.
//!
//! Either way the attempt commits everything or leaves no trace: staging
//! stores are promoted on success and deleted on any failure.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catchup::core::{NodeAddress, NodeState, SyncMode, TransactionId, ViewId};
//! use catchup::{CancelToken, ClusterView, FsStorage, StorageTransfer, TransferConfig, TransferContext};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(FsStorage::open("/var/lib/node").await?);
//!     let transfer = StorageTransfer::new(Arc::clone(&storage), storage, TransferConfig::default())?;
//!
//!     let peer = NodeState::new(
//!         NodeAddress::new("10.0.0.7", 7000),
//!         7100,
//!         SyncMode::Journals,
//!         TransactionId(1_204),
//!     );
//!     let context = TransferContext::new(TransactionId(1_100), peer);
//!
//!     let caught_up = transfer
//!         .attempt_transfer(&ClusterView::new(ViewId(12)), &context, &CancelToken::new())
//!         .await?;
//!     println!("caught up: {caught_up}");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `catchup::core` - Domain types and the request-header codec
//! - `catchup::store` - Storage traits and implementations
//! - `catchup::transfer` - Receiver, executor, configuration

pub use catchup_core as core;
pub use catchup_store as store;
pub use catchup_transfer as transfer;

pub use catchup_core::{
    ClusterView, NodeAddress, NodeState, RequestHeader, StreamType, SyncMode, TransactionId,
    TransferContext, ViewId, HEADER_LEN,
};
pub use catchup_store::{FsStorage, JournalStorage, MemoryStorage, SnapshotStorage, StoreError};
pub use catchup_transfer::{
    CancelToken, ClusterExecutor, StorageTransfer, TracingObserver, TransferConfig,
    TransferError, TransferObserver,
};
