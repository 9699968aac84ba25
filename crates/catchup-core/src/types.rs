//! Strong type definitions for cluster catch-up.
//!
//! Identifiers are newtypes so a view id can never be passed where a
//! transaction id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Cluster membership epoch. Increases every time membership changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewId(pub i64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Identifier of a committed transaction in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Version of a journal or snapshot store in local storage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StoreVersion(pub u64);

impl StoreVersion {
    /// The version immediately after this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Read-only view of the current cluster membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterView {
    pub view_id: ViewId,
}

impl ClusterView {
    pub const fn new(view_id: ViewId) -> Self {
        Self { view_id }
    }
}

/// Network location of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How a lagging node catches up with a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SyncMode {
    /// Pull the missing transaction and event journals.
    Journals = 1,
    /// Pull a full snapshot of the engine state.
    Snapshot = 2,
}

impl SyncMode {
    /// The tag used for this mode in [`NodeState::sync_mode`].
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SyncMode {
    type Error = CoreError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(SyncMode::Journals),
            2 => Ok(SyncMode::Snapshot),
            other => Err(CoreError::UnknownSyncMode(other)),
        }
    }
}

/// State advertised by a peer that is ahead of the local node.
///
/// `sync_mode` stays a raw tag: it arrives from another node and is only
/// interpreted when a transfer is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    /// Cluster traffic address of the peer.
    pub address: NodeAddress,
    /// Port on which the peer serves state transfer.
    pub sync_port: u16,
    /// Raw [`SyncMode`] tag.
    pub sync_mode: u8,
    /// Last transaction known to the peer.
    pub transaction_id: TransactionId,
}

impl NodeState {
    pub fn new(
        address: NodeAddress,
        sync_port: u16,
        sync_mode: SyncMode,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            address,
            sync_port,
            sync_mode: sync_mode.tag(),
            transaction_id,
        }
    }

    /// Address of the peer's state-transfer endpoint.
    pub fn sync_address(&self) -> NodeAddress {
        NodeAddress::new(self.address.host.clone(), self.sync_port)
    }

    /// Interpret the advertised sync mode.
    pub fn mode(&self) -> Result<SyncMode, CoreError> {
        SyncMode::try_from(self.sync_mode)
    }
}

/// A single catch-up request: where the local node stands, and whom to
/// pull from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferContext {
    /// The local node's current transaction id.
    pub transaction_id: TransactionId,
    /// The peer to synchronize from.
    pub latest_node: NodeState,
}

impl TransferContext {
    pub fn new(transaction_id: TransactionId, latest_node: NodeState) -> Self {
        Self {
            transaction_id,
            latest_node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_mode_tags() {
        assert_eq!(SyncMode::try_from(1).unwrap(), SyncMode::Journals);
        assert_eq!(SyncMode::try_from(2).unwrap(), SyncMode::Snapshot);
        assert!(matches!(
            SyncMode::try_from(0),
            Err(CoreError::UnknownSyncMode(0))
        ));
        assert_eq!(SyncMode::Snapshot.tag(), 2);
    }

    #[test]
    fn test_sync_address_uses_sync_port() {
        let node = NodeState::new(
            NodeAddress::new("10.0.0.5", 4000),
            4100,
            SyncMode::Journals,
            TransactionId(9),
        );
        assert_eq!(node.sync_address().to_string(), "10.0.0.5:4100");
        assert_eq!(node.mode().unwrap(), SyncMode::Journals);
    }

    #[test]
    fn test_store_version_next() {
        assert_eq!(StoreVersion(41).next(), StoreVersion(42));
        assert_eq!(StoreVersion::default(), StoreVersion(0));
    }

    #[test]
    fn test_context_serde() {
        let ctx = TransferContext::new(
            TransactionId(3),
            NodeState::new(
                NodeAddress::new("peer", 1),
                2,
                SyncMode::Snapshot,
                TransactionId(10),
            ),
        );
        let json = serde_json::to_string(&ctx).unwrap();
        let back: TransferContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }
}
