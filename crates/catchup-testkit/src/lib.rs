//! # Catch-up Testkit
//!
//! Testing utilities for cluster catch-up.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fake peer**: A loopback server answering requests from a script
//! - **Golden vectors**: Request headers with their exact wire bytes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: In-memory storage wired to a recording observer
//!
//! ## Fake Peer
//!
//! ```rust,no_run
//! use catchup_core::StreamType;
//! use catchup_testkit::peer::{FakePeer, PeerAction};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let peer = FakePeer::start([
//!     (StreamType::Transactions, PeerAction::Send(vec![1, 2, 3])),
//!     (StreamType::Events, PeerAction::Reset(vec![0xAA])),
//! ])
//! .await?;
//! println!("serving on {}", peer.address());
//! # Ok(())
//! # }
//! ```
//!
//! ## Golden Vectors
//!
//! Every serving implementation must agree on these bytes:
//!
//! ```rust
//! use catchup_testkit::vectors::all_vectors;
//!
//! for vector in all_vectors() {
//!     assert_eq!(vector.header().to_hex(), vector.expected_hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use catchup_testkit::generators::request_header;
//!
//! proptest! {
//!     #[test]
//!     fn header_roundtrips(header in request_header()) {
//!         prop_assert_eq!(RequestHeader::decode(&header.encode()).unwrap(), header);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod peer;
pub mod vectors;

pub use fixtures::{init_tracing, unused_port, view, ObservedEvent, RecordingObserver, TestFixture};
pub use peer::{FakePeer, PeerAction};
pub use vectors::{all_vectors, verify_all_vectors, HeaderVector};
