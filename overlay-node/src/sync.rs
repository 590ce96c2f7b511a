//! Periodic sync loop: ensure membership, resolve peer addresses, propagate
//! max-GUID (spec.md §4.4).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;

use overlay_sdk::node::Node;
use overlay_sdk::PeerClient;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::peers;
use crate::store::NodeStore;

/// Drives the periodic tick described in spec.md §4.4. A no-op on boot
/// nodes. Ticks never overlap — a tick still running when the next timer
/// fires causes that fire to be silently skipped (see the `try_lock` below).
pub struct SyncEngine {
    store: Arc<NodeStore>,
    http: reqwest::Client,
    boot_node: Option<Node>,
    self_address: String,
    tick_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<NodeStore>,
        http: reqwest::Client,
        boot_node: Option<Node>,
        self_address: String,
    ) -> Self {
        Self {
            store,
            http,
            boot_node,
            self_address,
            tick_lock: Mutex::new(()),
        }
    }

    /// Spawn the timer task. Returns immediately; the task runs until the
    /// process exits.
    pub fn spawn(self: Arc<Self>, config: &NodeConfig) {
        if self.boot_node.is_none() {
            tracing::info!("boot node: sync engine is a no-op");
            return;
        }
        let interval_secs = config.network_sync_interval;
        let jitter_secs = config.network_sync_jitter;
        let engine = self;
        tokio::spawn(async move {
            loop {
                let jitter = pick_jitter(jitter_secs);
                tokio::time::sleep(Duration::from_secs(interval_secs + jitter)).await;
                if let Ok(guard) = engine.tick_lock.try_lock() {
                    if let Err(e) = engine.tick().await {
                        tracing::warn!("sync tick failed: {e}");
                    }
                    drop(guard);
                } else {
                    tracing::debug!("sync tick already in progress, skipping this fire");
                }
            }
        });
    }

    /// A single pass of steps 1–4 in spec.md §4.4.
    pub async fn tick(&self) -> Result<(), NodeError> {
        let Some(boot) = self.boot_node.clone() else {
            return Ok(());
        };

        let self_node = match self.store.get_client()? {
            Some(node) => node,
            None => self.ensure_joined(&boot).await?,
        };

        let active = peers::resolve_active_peers(&self.store, &self.http, self_node.guid, &boot).await?;

        for peer in active {
            let client = PeerClient::new(self.http.clone(), peer.clone());
            let max_guid_node = self.store.get_max_guid_node()?;
            match client.sync(self_node.guid, max_guid_node).await {
                Ok(reported) => {
                    self.store.upsert_node(&reported)?;
                    tracing::info!(
                        "sync with {}: cluster max_guid now {}",
                        peer.guid,
                        self.store.get_max_guid()?
                    );
                }
                Err(e) if e.is_unreachable() => {
                    tracing::info!("peer {} unreachable during sync, skipping", peer.guid);
                }
                Err(e) => {
                    tracing::warn!("sync with {} failed: {e}", peer.guid);
                }
            }
        }
        Ok(())
    }

    /// Step 1: join (or rejoin with a previously-issued GUID) if this
    /// process has no client identity yet.
    async fn ensure_joined(&self, boot: &Node) -> Result<Node, NodeError> {
        let existing_guid = self
            .store
            .get_node_by_address(&self.self_address)?
            .map(|n| n.guid);
        let client = PeerClient::new(self.http.clone(), boot.clone());
        match client.join(&self.self_address, existing_guid).await {
            Ok(Some(node)) => {
                self.store.upsert_node(&node)?;
                self.store.set_client(&node)?;
                Ok(node)
            }
            Ok(None) => Err(NodeError::NetworkJoin),
            Err(e) => Err(NodeError::from(e)),
        }
    }
}

pub fn pick_jitter(jitter_secs: u64) -> u64 {
    if jitter_secs == 0 {
        0
    } else {
        rand::thread_rng().gen_range(1..=jitter_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn boot_node_tick_is_a_no_op() {
        let store = Arc::new(NodeStore::open_memory().unwrap());
        let engine = SyncEngine::new(store, reqwest::Client::new(), None, "boot:9000".into());
        engine.tick().await.unwrap();
    }

    #[test]
    fn jitter_is_within_bounds() {
        for _ in 0..50 {
            let j = pick_jitter(30);
            assert!((1..=30).contains(&j));
        }
        assert_eq!(pick_jitter(0), 0);
    }
}
