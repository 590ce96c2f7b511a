//! Incoming-broadcast state machine: origin/new/duplicate decision, TTL
//! decrement, seen-set update, fan-out scheduling (spec.md §4.5).

use std::sync::Arc;

use overlay_sdk::message::Message;
use overlay_sdk::node::Node;

use crate::dispatch::OutboundDispatcher;
use crate::error::NodeError;
use crate::peers;
use crate::store::NodeStore;

/// Known event tags forwarded messages may carry. Unknown tags are logged
/// and forwarded verbatim — this engine does not refuse to forward on an
/// unrecognized tag.
pub const EVENT_DEAD_PEER: &str = "DEAD_PEER";

pub struct BroadcastEngine {
    store: Arc<NodeStore>,
    dispatcher: OutboundDispatcher,
    http: reqwest::Client,
    self_node: Node,
    boot_node: Node,
}

impl BroadcastEngine {
    pub fn new(
        store: Arc<NodeStore>,
        dispatcher: OutboundDispatcher,
        http: reqwest::Client,
        self_node: Node,
        boot_node: Node,
    ) -> Self {
        Self {
            store,
            dispatcher,
            http,
            self_node,
            boot_node,
        }
    }

    /// Handle an incoming (or self-originated) message. Returns whether it
    /// was forwarded.
    pub async fn handle(&self, mut message: Message) -> Result<bool, NodeError> {
        if message.originator == self.self_node && message.is_unassigned() {
            let id = self.store.incr_message_counter()?;
            message.id = Some(id);
            message.broadcast_timestamp = Some(now_secs());
        } else if message.ttl == 0 {
            return Ok(false);
        } else if message.seen_by.contains(&self.self_node.guid) {
            return Ok(false);
        } else {
            let Some(id) = message.id else {
                return Ok(false);
            };
            if !self.store.update_counter_if_greater(id)? {
                return Ok(false);
            }
            message.ttl -= 1;
            self.store.upsert_node(&message.originator)?;
        }

        if let Some(name) = message.event_name() {
            if name == EVENT_DEAD_PEER {
                tracing::info!("observed DEAD_PEER event in forwarded message");
            } else {
                tracing::debug!("forwarding message with unrecognized event tag {name}");
            }
        }

        message.seen_by.insert(self.self_node.guid);
        if let Some(id) = message.id {
            self.store.record_seen(message.originator.guid, id)?;
        }

        let candidates =
            peers::resolve_active_peers(&self.store, &self.http, self.self_node.guid, &self.boot_node)
                .await?;
        let fanout: Vec<Node> = candidates
            .into_iter()
            .filter(|p| !message.seen_by.contains(&p.guid))
            .collect();
        self.dispatcher.enqueue(fanout, message);
        Ok(true)
    }
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
