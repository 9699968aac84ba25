//! # Catch-up Core
//!
//! Pure primitives for cluster catch-up: identifiers, peer descriptions and
//! the state-transfer request codec.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ClusterView`] - The membership epoch a transfer runs under
//! - [`NodeState`] - The peer to pull state from, and how
//! - [`TransferContext`] - One catch-up request
//! - [`RequestHeader`] - The 17-byte request sent on every transfer connection
//!
//! ## Wire Format
//!
//! See the [`wire`] module. Responses are unframed: the serving peer writes
//! the payload and closes the connection.

pub mod error;
pub mod types;
pub mod wire;

pub use error::CoreError;
pub use types::{
    ClusterView, NodeAddress, NodeState, StoreVersion, SyncMode, TransactionId, TransferContext,
    ViewId,
};
pub use wire::{RequestHeader, StreamType, HEADER_LEN};
