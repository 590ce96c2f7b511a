//! Boot-node-only GUID allocation.

use std::sync::Arc;

use overlay_sdk::guid::Guid;
use overlay_sdk::node::Node;

use crate::error::NodeError;
use crate::store::NodeStore;

/// Issues GUIDs idempotently per address, or rebinds a reclaimed GUID on
/// rejoin. Constructed only when the process is the boot node — see
/// [`crate::server::SharedState`].
pub struct JoinService {
    store: Arc<NodeStore>,
}

impl JoinService {
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self { store }
    }

    /// `sender_address` is this call's ground truth for "where is the
    /// caller reachable" — the HTTP layer extracts it from the join
    /// request (see spec.md §4.6 and the design note on address transport).
    pub fn join(
        &self,
        sender_address: &str,
        proposed_guid: Option<Guid>,
    ) -> Result<Node, NodeError> {
        if let Some(guid) = proposed_guid {
            return self.rejoin(guid, sender_address);
        }
        if let Some(existing) = self.store.get_node_by_address(sender_address)? {
            return Ok(existing);
        }
        self.store.allocate_node(sender_address)
    }

    fn rejoin(&self, guid: Guid, sender_address: &str) -> Result<Node, NodeError> {
        match self.store.get_node_by_guid(guid)? {
            Some(_) => {
                self.store.rebind(guid, sender_address)?;
                Ok(Node::new(guid, sender_address))
            }
            None => Err(NodeError::StoreConflict(format!(
                "guid {guid} was never allocated, refusing rejoin"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_service() -> JoinService {
        JoinService::new(Arc::new(NodeStore::open_memory().unwrap()))
    }

    // S1 from spec.md §8.
    #[test]
    fn single_join_is_idempotent() {
        let svc = join_service();
        let first = svc.join("10.0.0.5", None).unwrap();
        assert_eq!(first.guid, Guid(1));
        assert_eq!(first.address, "10.0.0.5");

        let second = svc.join("10.0.0.5", None).unwrap();
        assert_eq!(second.guid, first.guid);
        assert_eq!(second.address, first.address);
    }

    // S2 from spec.md §8.
    #[test]
    fn rejoin_with_known_guid_rebinds_address() {
        let svc = join_service();
        let first = svc.join("10.0.0.5", None).unwrap();
        let rejoined = svc.join("10.0.0.6", Some(first.guid)).unwrap();
        assert_eq!(rejoined.guid, first.guid);
        assert_eq!(rejoined.address, "10.0.0.6");
    }

    #[test]
    fn rejoin_with_unallocated_guid_is_refused() {
        let svc = join_service();
        let err = svc.join("10.0.0.9", Some(Guid(42))).unwrap_err();
        assert!(matches!(err, NodeError::StoreConflict(_)));
    }

    // Property 7 from spec.md §8.
    #[test]
    fn join_is_idempotent_for_same_address() {
        let svc = join_service();
        let a = svc.join("1.1.1.1", None).unwrap();
        let b = svc.join("1.1.1.1", None).unwrap();
        assert_eq!(a.guid, b.guid);
    }
}
