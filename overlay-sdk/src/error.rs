//! Error taxonomy shared between peers.

use crate::guid::Guid;

/// Errors a [`crate::PeerClient`] call or ring computation can raise.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Transport-level failure or timeout. The caller uses this as the
    /// liveness signal — a peer that returns this is treated as dead for
    /// this tick, not as a hard error.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The peer answered with a 4xx/5xx HTTP status.
    #[error("protocol error ({status}): {body}")]
    Protocol { status: u16, body: String },

    /// The peer's response body didn't decode into the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A ring computation was asked about a GUID that isn't a member of the
    /// network for the given `guid_max`. Programmer error — aborts the
    /// current ring computation rather than being recovered from.
    #[error("guid {0} is not in the network")]
    GuidNotInNetwork(Guid),
}

impl SdkError {
    /// `true` for errors a sync tick or liveness check should treat as "peer
    /// is down this round" rather than surfacing.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, SdkError::Unreachable(_))
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            SdkError::Unreachable(err.to_string())
        } else if let Some(status) = err.status() {
            SdkError::Protocol {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SdkError::MalformedResponse(err.to_string())
        }
    }
}
