//! The broadcast message wire shape.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::guid::Guid;
use crate::node::Node;

/// A flood-broadcast message. `id` and `broadcast_timestamp` are `None`
/// until the originator's broadcast engine assigns them on first handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<u64>,
    pub originator: Node,
    pub broadcast_timestamp: Option<f64>,
    pub ttl: u32,
    #[serde(default)]
    pub seen_by: HashSet<Guid>,
    pub data: serde_json::Value,
}

impl Message {
    /// A fresh message originated by `self_node`, not yet assigned an id.
    pub fn originate(self_node: Node, ttl: u32, data: serde_json::Value) -> Self {
        Self {
            id: None,
            originator: self_node,
            broadcast_timestamp: None,
            ttl,
            seen_by: HashSet::new(),
            data,
        }
    }

    /// `true` if this message has not yet been assigned an id by its
    /// originator — i.e. it is fresh off `originate`.
    pub fn is_unassigned(&self) -> bool {
        self.id.is_none() && self.broadcast_timestamp.is_none()
    }

    /// The `data.event.name` tag, if present.
    pub fn event_name(&self) -> Option<&str> {
        self.data.get("event")?.get("name")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_extraction() {
        let m = Message::originate(
            Node::boot("127.0.0.1:9000"),
            3,
            serde_json::json!({"event": {"name": "DEAD_PEER"}}),
        );
        assert_eq!(m.event_name(), Some("DEAD_PEER"));
    }

    #[test]
    fn event_name_absent() {
        let m = Message::originate(Node::boot("127.0.0.1:9000"), 3, serde_json::json!({}));
        assert_eq!(m.event_name(), None);
    }
}
