//! Shared types and the typed HTTP client for talking to overlay ring peers.
//!
//! `overlay-sdk` is the thin crate any process that speaks to the ring needs:
//! the boot node, a regular peer, or a test harness faking one. It has no
//! notion of *local* state (that's `overlay-node`'s `NodeStore`) — only the
//! wire shapes and the [`PeerClient`] that sends them.

pub mod client;
pub mod error;
pub mod guid;
pub mod message;
pub mod node;

pub use client::PeerClient;
pub use error::SdkError;
pub use guid::{Guid, RingTopology};
pub use message::Message;
pub use node::Node;
