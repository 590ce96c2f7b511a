//! Boot node / peer process for the overlay ring network.
//!
//! See `SPEC_FULL.md` at the repository root for the full component
//! breakdown. The short version: [`store::NodeStore`] is the only shared
//! mutable state; [`join::JoinService`], [`sync::SyncEngine`], and
//! [`broadcast::BroadcastEngine`] are stateless-beyond-the-store workers
//! built on top of it; [`web`] wires them to HTTP.

pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod join;
pub mod peers;
pub mod server;
pub mod store;
pub mod sync;
pub mod web;
