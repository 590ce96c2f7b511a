//! End-to-end tests against the axum router directly, driven with
//! `tower::ServiceExt::oneshot` rather than a bound socket. Covers the join
//! and sync scenarios from spec.md §8 (S1, S2, S6) at the HTTP layer, one
//! level above the unit tests in `join.rs` / `store.rs`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use overlay_node::broadcast::BroadcastEngine;
use overlay_node::config::NodeConfig;
use overlay_node::dispatch::OutboundDispatcher;
use overlay_node::join::JoinService;
use overlay_node::store::NodeStore;
use overlay_node::web;
use overlay_sdk::node::Node;

fn boot_config() -> NodeConfig {
    NodeConfig {
        listen_addr: "boot.local:9000".into(),
        boot_node: None,
        network_sync_interval: 60,
        network_sync_jitter: 30,
        log_dir: None,
        storage_dir: ":memory:".into(),
        dispatch_concurrency: 4,
    }
}

fn boot_state() -> Arc<overlay_node::server::SharedState> {
    let store = Arc::new(NodeStore::open_memory().unwrap());
    let boot = Node::boot("boot.local:9000");
    store.upsert_node(&boot).unwrap();
    store.set_client(&boot).unwrap();

    let http = reqwest::Client::new();
    let dispatcher = OutboundDispatcher::new(http.clone(), 4);
    let broadcast_engine = BroadcastEngine::new(
        store.clone(),
        dispatcher,
        http.clone(),
        boot.clone(),
        boot.clone(),
    );

    Arc::new(overlay_node::server::SharedState {
        config: boot_config(),
        store: store.clone(),
        http,
        boot_node: None,
        join_service: Some(JoinService::new(store)),
        broadcast_engine,
    })
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn status_reports_boot_node() {
    let app = web::router(boot_state());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["is_boot_node"], true);
}

// S1 from spec.md §8, driven through the HTTP layer.
#[tokio::test]
async fn join_over_http_is_idempotent() {
    // This state's join_service owns its own fresh store, independent of
    // `store` above, so assert against the response bodies only.
    let state = boot_state();
    let app = web::router(state);

    let req = |body: &str| {
        Request::builder()
            .method("PUT")
            .uri("/api/v1/network/join")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "10.0.0.5:9000")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(req("{}")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_json = body_json(first).await;
    let guid = first_json["guid"].as_u64().unwrap();
    assert_eq!(first_json["address"], "10.0.0.5:9000");

    let second = app.oneshot(req("{}")).await.unwrap();
    let second_json = body_json(second).await;
    assert_eq!(second_json["guid"].as_u64().unwrap(), guid);
}

#[tokio::test]
async fn join_on_non_boot_node_returns_empty_body() {
    let store = Arc::new(NodeStore::open_memory().unwrap());
    let self_node = Node::new(overlay_sdk::Guid(3), "peer.local:9000");
    store.upsert_node(&self_node).unwrap();
    store.set_client(&self_node).unwrap();

    let boot = Node::boot("boot.local:9000");
    let http = reqwest::Client::new();
    let dispatcher = OutboundDispatcher::new(http.clone(), 4);
    let broadcast_engine = BroadcastEngine::new(
        store.clone(),
        dispatcher,
        http.clone(),
        self_node.clone(),
        boot.clone(),
    );
    let state = Arc::new(overlay_node::server::SharedState {
        config: NodeConfig {
            listen_addr: "peer.local:9000".into(),
            boot_node: Some("boot.local:9000".into()),
            ..boot_config()
        },
        store,
        http,
        boot_node: Some(boot),
        join_service: None,
        broadcast_engine,
    });

    let app = web::router(state);
    let resp = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/network/join")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "1.2.3.4:9000")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json, serde_json::json!({}));
}

// S6 from spec.md §8: the sync endpoint's answer tracks the cluster max
// GUID, rising monotonically as higher-GUID nodes are reported to it.
#[tokio::test]
async fn sync_over_http_tracks_rising_max_guid() {
    let app = web::router(boot_state());

    let sync_body = serde_json::json!({
        "guid": 7,
        "max_guid_node": {"guid": 7, "address": "7.7.7.7:9000"},
    });
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/sync")
                .header("content-type", "application/json")
                .body(Body::from(sync_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let reported = body_json(resp).await;
    assert_eq!(reported["guid"], 7);

    // A lower max_guid_node from a different peer must not roll us back.
    let lower_body = serde_json::json!({
        "guid": 2,
        "max_guid_node": {"guid": 2, "address": "2.2.2.2:9000"},
    });
    let resp2 = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/sync")
                .header("content-type", "application/json")
                .body(Body::from(lower_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let reported2 = body_json(resp2).await;
    assert_eq!(reported2["guid"], 7);
}

#[tokio::test]
async fn node_address_lookup_returns_null_when_unknown() {
    let app = web::router(boot_state());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/nodes/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(json.is_null());
}
