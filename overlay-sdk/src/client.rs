//! Typed RPC client for a remote node's `/api/v1` surface.
//!
//! One method per endpoint in spec.md §6. Every call carries its own
//! timeout; transport/timeout failures classify as [`SdkError::Unreachable`]
//! so callers can use them as the liveness signal without matching on error
//! text.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SdkError;
use crate::guid::Guid;
use crate::message::Message;
use crate::node::Node;

/// Default timeout for a full RPC round trip.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for a bare liveness probe (`status`).
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// A handle to one remote node, reusing a single `reqwest::Client`
/// connection pool the way the teacher's verifier modules reuse
/// `reqwest::Client::new()` across calls rather than per-request.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    node: Node,
}

#[derive(Serialize)]
struct JoinRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    guid: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JoinResponse {
    Joined { address: String, guid: u64 },
    Empty {},
}

#[derive(Serialize)]
struct SyncRequest {
    guid: u64,
    max_guid_node: Node,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[allow(dead_code)]
    #[serde(default)]
    is_boot_node: bool,
}

impl PeerClient {
    /// Build a client targeting `node`, with the given pooled `http` client.
    pub fn new(http: reqwest::Client, node: Node) -> Self {
        Self { http, node }
    }

    /// Construct a standalone client with fresh connection pool and the
    /// default timeouts from this module.
    pub fn connect(node: Node) -> Result<Self, SdkError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_RPC_TIMEOUT)
            .build()
            .map_err(SdkError::from)?;
        Ok(Self::new(http, node))
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// `GET /status`. A completed call means "alive".
    pub async fn status(&self) -> Result<(), SdkError> {
        let url = format!("{}/status", self.node.api_base());
        let resp = self
            .http
            .get(url)
            .timeout(DEFAULT_LIVENESS_TIMEOUT)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let _: StatusResponse = resp.json().await.map_err(|e| SdkError::MalformedResponse(e.to_string()))?;
        Ok(())
    }

    /// `PUT /network/join`. `proposed_guid` requests a rejoin with a
    /// previously-issued identity.
    pub async fn join(
        &self,
        sender_address: &str,
        proposed_guid: Option<Guid>,
    ) -> Result<Option<Node>, SdkError> {
        let url = format!("{}/network/join", self.node.api_base());
        let body = JoinRequest {
            guid: proposed_guid.map(u64::from),
        };
        let resp = self
            .http
            .put(url)
            .timeout(DEFAULT_RPC_TIMEOUT)
            .header("x-forwarded-for", sender_address)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let parsed: JoinResponse = resp
            .json()
            .await
            .map_err(|e| SdkError::MalformedResponse(e.to_string()))?;
        Ok(match parsed {
            JoinResponse::Joined { address, guid } => Some(Node::new(Guid(guid), address)),
            JoinResponse::Empty {} => None,
        })
    }

    /// `GET /nodes/{guid}` — the address a peer has cached for `guid`, if any.
    pub async fn node_address(&self, guid: Guid) -> Result<Option<String>, SdkError> {
        let url = format!("{}/nodes/{}", self.node.api_base(), guid);
        let resp = self
            .http
            .get(url)
            .timeout(DEFAULT_RPC_TIMEOUT)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let address: Option<String> = resp
            .json()
            .await
            .map_err(|e| SdkError::MalformedResponse(e.to_string()))?;
        Ok(address)
    }

    /// `POST /sync` — exchange max-GUID knowledge, returning the peer's
    /// resulting max-GUID node.
    pub async fn sync(&self, sender_guid: Guid, max_guid_node: Node) -> Result<Node, SdkError> {
        let url = format!("{}/sync", self.node.api_base());
        let body = SyncRequest {
            guid: sender_guid.into(),
            max_guid_node,
        };
        let resp = self
            .http
            .post(url)
            .timeout(DEFAULT_RPC_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| SdkError::MalformedResponse(e.to_string()))
    }

    /// `PUT /broadcast` — returns whether the peer forwarded the message.
    pub async fn broadcast(&self, message: &Message) -> Result<bool, SdkError> {
        let url = format!("{}/broadcast", self.node.api_base());
        let resp = self
            .http
            .put(url)
            .timeout(DEFAULT_RPC_TIMEOUT)
            .json(message)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| SdkError::MalformedResponse(e.to_string()))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SdkError> {
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SdkError::Protocol {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}
