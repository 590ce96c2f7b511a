//! axum router for the `/api/v1` surface described in spec.md §6.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use overlay_sdk::guid::Guid;
use overlay_sdk::message::Message;
use overlay_sdk::node::Node;

use crate::error::NodeError;
use crate::server::SharedState;

pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/network/join", put(network_join))
        .route("/api/v1/nodes/{guid}", get(node_address))
        .route("/api/v1/sync", post(sync))
        .route("/api/v1/broadcast", put(broadcast))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResponse {
    is_boot_node: bool,
}

async fn status(State(state): State<Arc<SharedState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        is_boot_node: state.join_service.is_some(),
    })
}

#[derive(Deserialize)]
struct JoinBody {
    guid: Option<u64>,
}

#[derive(Serialize)]
struct JoinResponse {
    address: String,
    guid: u64,
}

/// The caller's reachable address travels out-of-band of the JSON body (the
/// body only ever carries `guid`, per spec.md §6's exact shape) as an
/// `x-forwarded-for` header — see DESIGN.md's note on address transport.
async fn network_join(
    State(state): State<Arc<SharedState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<JoinBody>,
) -> Result<impl IntoResponse, NodeError> {
    let Some(join_service) = &state.join_service else {
        return Err(NodeError::NetworkJoin);
    };
    let sender_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let node = join_service.join(&sender_address, body.guid.map(Guid))?;
    Ok(Json(JoinResponse {
        address: node.address,
        guid: node.guid.into(),
    }))
}

async fn node_address(
    State(state): State<Arc<SharedState>>,
    Path(guid): Path<u64>,
) -> Result<Json<Option<String>>, NodeError> {
    let node = state.store.get_node_by_guid(Guid(guid))?;
    Ok(Json(node.map(|n| n.address)))
}

#[derive(Deserialize)]
struct SyncBody {
    #[allow(dead_code)]
    guid: u64,
    max_guid_node: Node,
}

/// Learn the sender's reported max-GUID node, then answer with our own —
/// `get_max_guid()` rises monotonically across the cluster this way
/// (spec.md §4.4 step 4).
async fn sync(
    State(state): State<Arc<SharedState>>,
    Json(body): Json<SyncBody>,
) -> Result<Json<Node>, NodeError> {
    state.store.upsert_node(&body.max_guid_node)?;
    let resolved = state.store.get_max_guid_node()?;
    Ok(Json(resolved))
}

async fn broadcast(
    State(state): State<Arc<SharedState>>,
    Json(message): Json<Message>,
) -> Result<Json<bool>, NodeError> {
    let forwarded = state.broadcast_engine.handle(message).await?;
    Ok(Json(forwarded))
}
