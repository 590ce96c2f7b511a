//! Shared ring-peer resolution used by both the sync engine and the
//! broadcast engine (spec.md §4.4 step 3 / §4.5's "same ring as §4.4").

use std::sync::Arc;

use overlay_sdk::guid::{Guid, RingTopology};
use overlay_sdk::node::Node;
use overlay_sdk::PeerClient;

use crate::error::NodeError;
use crate::store::NodeStore;

/// Resolves this node's primary peers into live `Node`s, substituting the
/// first live backup for any primary that fails its liveness check.
pub async fn resolve_active_peers(
    store: &Arc<NodeStore>,
    http: &reqwest::Client,
    self_guid: Guid,
    boot: &Node,
) -> Result<Vec<Node>, NodeError> {
    let max = store.get_max_guid()?;
    if max.0 == 0 {
        return Ok(Vec::new());
    }
    let primaries = RingTopology::primary_peers(self_guid, max);
    let mut active = Vec::with_capacity(primaries.len());

    for (i, primary_guid) in primaries.iter().enumerate() {
        let Some(node) = resolve_address(store, http, boot, *primary_guid).await? else {
            continue;
        };
        if is_alive(http, &node).await {
            active.push(node);
            continue;
        }
        tracing::info!("peer {primary_guid} unresponsive, looking for a backup");
        let next_primary = primaries.get(i + 1).copied().unwrap_or(self_guid);
        let backups = RingTopology::backup_peers(self_guid, *primary_guid, next_primary, max)
            .map_err(NodeError::from)?;
        for backup_guid in backups {
            let Some(backup) = resolve_address(store, http, boot, backup_guid).await? else {
                continue;
            };
            if is_alive(http, &backup).await {
                active.push(backup);
                break;
            }
        }
    }
    Ok(active)
}

async fn resolve_address(
    store: &Arc<NodeStore>,
    http: &reqwest::Client,
    boot: &Node,
    guid: Guid,
) -> Result<Option<Node>, NodeError> {
    if let Some(node) = store.get_node_by_guid(guid)? {
        return Ok(Some(node));
    }
    let boot_client = PeerClient::new(http.clone(), boot.clone());
    match boot_client.node_address(guid).await {
        Ok(Some(address)) => {
            let node = Node::new(guid, address);
            store.upsert_node(&node)?;
            Ok(Some(node))
        }
        Ok(None) => Ok(None),
        Err(e) => {
            tracing::warn!("boot node address lookup for {guid} failed: {e}");
            Ok(None)
        }
    }
}

async fn is_alive(http: &reqwest::Client, node: &Node) -> bool {
    let client = PeerClient::new(http.clone(), node.clone());
    client.status().await.is_ok()
}
