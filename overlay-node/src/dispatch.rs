//! Asynchronous, single-attempt delivery of outbound broadcasts.
//!
//! Jobs are independent and may complete in any order; a failure is logged
//! and dropped rather than retried — the flood protocol relies on other
//! peers re-fanning-out, not on this dispatcher's persistence.

use std::sync::Arc;

use tokio::sync::Semaphore;

use overlay_sdk::message::Message;
use overlay_sdk::node::Node;
use overlay_sdk::PeerClient;

/// Bounded-concurrency fan-out of `(peer, message)` jobs.
#[derive(Clone)]
pub struct OutboundDispatcher {
    http: reqwest::Client,
    limit: Arc<Semaphore>,
}

impl OutboundDispatcher {
    pub fn new(http: reqwest::Client, max_concurrency: usize) -> Self {
        Self {
            http,
            limit: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Enqueue one delivery per `(peer, message)` pair. Each runs as an
    /// independent task; this returns immediately without waiting for any
    /// of them to complete.
    pub fn enqueue(&self, peers: Vec<Node>, message: Message) {
        for peer in peers {
            let http = self.http.clone();
            let limit = self.limit.clone();
            let message = message.clone();
            tokio::spawn(async move {
                let Ok(_permit) = limit.acquire_owned().await else {
                    return;
                };
                let client = PeerClient::new(http, peer.clone());
                match client.broadcast(&message).await {
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("broadcast delivery to {} failed: {e}", peer.guid);
                    }
                }
            });
        }
    }
}
