//! Process wiring: builds the shared state, performs initial join (if a
//! peer), starts the sync-engine timer task, and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use overlay_sdk::node::Node;
use overlay_sdk::PeerClient;

use crate::broadcast::BroadcastEngine;
use crate::config::NodeConfig;
use crate::dispatch::OutboundDispatcher;
use crate::error::NodeError;
use crate::join::JoinService;
use crate::store::NodeStore;
use crate::sync::SyncEngine;

/// State shared across every axum handler and the background sync task.
pub struct SharedState {
    pub config: NodeConfig,
    pub store: Arc<NodeStore>,
    pub http: reqwest::Client,
    pub boot_node: Option<Node>,
    /// `Some` only on the boot node (spec.md §4.6: join on non-boot nodes
    /// must never mint a second GUID).
    pub join_service: Option<JoinService>,
    pub broadcast_engine: BroadcastEngine,
}

impl SharedState {
    /// This process's own Node, if it has joined (or is the boot node).
    pub fn self_node(&self) -> Result<Option<Node>, NodeError> {
        if self.boot_node.is_none() {
            return Ok(Some(Node::boot(&self.config.listen_addr)));
        }
        self.store.get_client()
    }
}

pub struct Server {
    config: NodeConfig,
}

impl Server {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let store = Arc::new(NodeStore::open(self.config.storage_path())?);
        let http = reqwest::Client::builder()
            .timeout(overlay_sdk::client::DEFAULT_RPC_TIMEOUT)
            .build()?;

        let boot_node = self
            .config
            .boot_node
            .clone()
            .map(Node::boot);

        let self_node = if let Some(ref boot) = boot_node {
            store.upsert_node(&Node::boot(boot.address.clone()))?;
            join_with_retry(&store, &http, boot, &self.config.listen_addr).await?
        } else {
            let boot_self = Node::boot(&self.config.listen_addr);
            store.upsert_node(&boot_self)?;
            store.set_client(&boot_self)?;
            boot_self
        };

        let dispatcher = OutboundDispatcher::new(http.clone(), self.config.dispatch_concurrency);
        let broadcast_engine = BroadcastEngine::new(
            store.clone(),
            dispatcher,
            http.clone(),
            self_node.clone(),
            boot_node.clone().unwrap_or_else(|| self_node.clone()),
        );
        let join_service = boot_node.is_none().then(|| JoinService::new(store.clone()));

        let state = Arc::new(SharedState {
            config: self.config.clone(),
            store: store.clone(),
            http: http.clone(),
            boot_node: boot_node.clone(),
            join_service,
            broadcast_engine,
        });

        if boot_node.is_some() {
            let engine = Arc::new(SyncEngine::new(
                store.clone(),
                http.clone(),
                boot_node.clone(),
                state.config.listen_addr.clone(),
            ));
            engine.spawn(&state.config);
        }

        let listener = tokio::net::TcpListener::bind(&state.config.listen_addr).await?;
        tracing::info!("overlay node listening on {}", state.config.listen_addr);
        let app = crate::web::router(state);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Retry the initial join against the boot node with a short fixed backoff,
/// mirroring the original daemon's "wait for the peer to come up" loop.
async fn join_with_retry(
    store: &Arc<NodeStore>,
    http: &reqwest::Client,
    boot: &Node,
    self_address: &str,
) -> anyhow::Result<Node> {
    if let Some(existing) = store.get_client()? {
        return Ok(existing);
    }
    let existing_guid = store.get_node_by_address(self_address)?.map(|n| n.guid);
    let client = PeerClient::new(http.clone(), boot.clone());
    let mut attempt = 0u32;
    loop {
        match client.join(self_address, existing_guid).await {
            Ok(Some(node)) => {
                store.upsert_node(&node)?;
                store.set_client(&node)?;
                return Ok(node);
            }
            Ok(None) => {
                anyhow::bail!("boot node {} refused join (not a boot node?)", boot.address)
            }
            Err(e) if e.is_unreachable() && attempt < 10 => {
                attempt += 1;
                tracing::info!("boot node not yet reachable ({e}), retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
