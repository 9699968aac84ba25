//! # Catch-up Transfer
//!
//! Brings a lagging node up to date by pulling durable state from a peer
//! that is ahead.
//!
//! ## Overview
//!
//! A transfer attempt pulls either the missing journals (transaction
//! commits, then events) or a full snapshot. Incoming bytes are staged in
//! temporary stores and only promoted once every stream arrived intact;
//! any failure discards the staged data.
//!
//! ## Key Properties
//!
//! - **All or nothing**: staged stores are merged/moved or deleted, never left behind
//! - **Ordered**: events are requested only after transactions succeeded
//! - **Bounded**: connect and read-idle timeouts, plus cooperative cancellation
//! - **Observable**: every phase is reported to a [`TransferObserver`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catchup_core::{ClusterView, TransferContext, ViewId};
//! use catchup_store::FsStorage;
//! use catchup_transfer::{CancelToken, StorageTransfer, TransferConfig};
//!
//! async fn example(context: TransferContext) {
//!     let storage = Arc::new(FsStorage::open("/var/lib/node").await.unwrap());
//!     let transfer =
//!         StorageTransfer::new(Arc::clone(&storage), storage, TransferConfig::default()).unwrap();
//!
//!     let view = ClusterView::new(ViewId(12));
//!     let caught_up = transfer
//!         .attempt_transfer(&view, &context, &CancelToken::new())
//!         .await
//!         .unwrap();
//!     println!("caught up: {caught_up}");
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Lagging node                         Peer (sync port)
//!   |-- connect ------------------------->|
//!   |-- [view id | 1 | tx id] ----------->|
//!   |<------------- transaction log bytes |
//!   |<------------------------------ FIN  |
//!   |-- connect ------------------------->|
//!   |-- [view id | 2 | tx id] ----------->|
//!   |<------------------- event log bytes |
//!   |<------------------------------ FIN  |
//! ```
//!
//! Snapshot mode is a single exchange with stream type `0`.

pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod observer;
pub mod receiver;

pub use cancel::CancelToken;
pub use config::{TransferConfig, DEFAULT_BUFFER_SIZE};
pub use error::{Result, TransferError};
pub use executor::{ClusterExecutor, StorageTransfer};
pub use observer::{NoopObserver, TracingObserver, TransferObserver};
pub use receiver::{StreamReceiver, StreamReport};
