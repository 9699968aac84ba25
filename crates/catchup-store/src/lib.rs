//! # Catch-up Store
//!
//! Storage abstraction for cluster catch-up. The transfer executor stages
//! incoming journals and snapshots in temporary stores and promotes them
//! only once every stream arrived intact.
//!
//! ## Key Types
//!
//! - [`JournalStorage`] / [`SnapshotStorage`] - Store lifecycle traits
//! - [`Sink`] - Write-only destination that must be closed exactly once
//! - [`FsStorage`] - Directory-backed storage
//! - [`MemoryStorage`] - In-memory storage with call recording and fault injection, for tests
//!
//! ## Lifecycle
//!
//! ```text
//! allocate temp ──> open sink ──> write* ──> close
//!       │                                      │
//!       └──── merge / move into target <───────┘   (commit)
//!       └──── delete temp + target                 (rollback)
//! ```

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use fs::FsStorage;
pub use memory::{CallLog, MemoryFaults, MemoryStorage, StoreState};
pub use traits::{
    JournalPlacement, JournalStorage, JournalStore, JournalStream, Sink, SnapshotStorage,
    SnapshotStore, StoreId,
};
