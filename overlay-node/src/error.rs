//! `overlay-node`'s error type and its axum `IntoResponse` mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use overlay_sdk::SdkError;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    /// `allocate_node` observed a uniqueness violation. Never occurs under
    /// single-writer discipline; if seen, it's a bug, not user error.
    #[error("store conflict: {0}")]
    StoreConflict(String),

    /// A join request landed on a non-boot node.
    #[error("join request received by a non-boot node")]
    NetworkJoin,

    #[error(transparent)]
    Ring(#[from] overlay_sdk::error::SdkError),
}

impl NodeError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, NodeError::Ring(SdkError::Unreachable(_)))
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        match self {
            // Per spec.md §4.6: a join on a non-boot node returns an empty
            // 200, not an error — it must never look like a retryable fault.
            NodeError::NetworkJoin => axum::Json(serde_json::json!({})).into_response(),
            NodeError::StoreConflict(msg) => {
                tracing::error!("store conflict: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
            NodeError::Store(e) => {
                tracing::error!("storage error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
            NodeError::Ring(e) => {
                tracing::warn!("ring error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}
