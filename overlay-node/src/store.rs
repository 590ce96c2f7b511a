//! SQLite-backed `NodeStore`.
//!
//! Persists the GUID↔address mapping, the designated client record, and the
//! broadcast message counter. Every public method is a single statement (or
//! a single transaction) against the connection, so operations are atomic
//! with respect to each other — see §4.2's concurrency contract.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use overlay_sdk::guid::Guid;
use overlay_sdk::node::Node;

use crate::error::NodeError;

/// Handle to the node's persistent state. `Connection` is wrapped in a
/// `Mutex` because `rusqlite::Connection` is `!Sync`; every operation here
/// is short enough that this never blocks a caller across a network call.
pub struct NodeStore {
    conn: Mutex<Connection>,
}

impl NodeStore {
    /// Open (or create) the database at `path`. Use `":memory:"` for tests.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NodeError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    pub fn open_memory() -> Result<Self, NodeError> {
        Self::open(":memory:")
    }

    fn init(&self) -> Result<(), NodeError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nodes (
                guid        INTEGER PRIMARY KEY,
                address     TEXT NOT NULL UNIQUE,
                is_client   INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS message_counter (
                id      INTEGER PRIMARY KEY CHECK (id = 1),
                counter INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO message_counter (id, counter) VALUES (1, 0);

            CREATE TABLE IF NOT EXISTS seen_messages (
                originator_guid INTEGER NOT NULL,
                message_id      INTEGER NOT NULL,
                PRIMARY KEY (originator_guid, message_id)
            );
            ",
        )?;
        Ok(())
    }

    /// Only legal on the boot node. Picks the next GUID (one greater than
    /// the current max, starting at 1) and persists `(guid, address)`.
    /// Idempotent: if `address` is already bound, returns the existing node.
    pub fn allocate_node(&self, address: &str) -> Result<Node, NodeError> {
        let conn = self.conn.lock().unwrap();
        if let Some(guid) = existing_guid_for_address(&conn, address)? {
            return Ok(Node::new(guid, address));
        }
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(guid), 0) + 1 FROM nodes",
            [],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO nodes (guid, address) VALUES (?1, ?2)",
            params![next, address],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                NodeError::StoreConflict(format!("guid {next} or address {address} already bound"))
            }
            other => NodeError::Store(other),
        })?;
        Ok(Node::new(Guid(next as u64), address))
    }

    /// Rebind an existing GUID's address, used only by the join service's
    /// rejoin path (see §9: "rejoin through JoinService is the only
    /// sanctioned rebind").
    pub fn rebind(&self, guid: Guid, address: &str) -> Result<(), NodeError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE nodes SET address = ?1 WHERE guid = ?2",
            params![address, guid.0 as i64],
        )?;
        Ok(())
    }

    /// Insert `(address, guid)` if absent; no-op otherwise. If `guid` is
    /// already bound to a *different* address, the conflict is logged and
    /// ignored — the first-seen address wins (see DESIGN.md's open
    /// question on address conflicts).
    pub fn upsert_node(&self, node: &Node) -> Result<(), NodeError> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT address FROM nodes WHERE guid = ?1",
                params![node.guid.0 as i64],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            None => {
                conn.execute(
                    "INSERT INTO nodes (guid, address) VALUES (?1, ?2)",
                    params![node.guid.0 as i64, node.address],
                )?;
            }
            Some(addr) if addr != node.address => {
                tracing::warn!(
                    "ignoring address conflict for guid {}: have {addr}, saw {}",
                    node.guid,
                    node.address
                );
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn get_node_by_guid(&self, guid: Guid) -> Result<Option<Node>, NodeError> {
        let conn = self.conn.lock().unwrap();
        let address: Option<String> = conn
            .query_row(
                "SELECT address FROM nodes WHERE guid = ?1",
                params![guid.0 as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(address.map(|address| Node::new(guid, address)))
    }

    pub fn get_node_by_address(&self, address: &str) -> Result<Option<Node>, NodeError> {
        let conn = self.conn.lock().unwrap();
        let guid = existing_guid_for_address(&conn, address)?;
        Ok(guid.map(|guid| Node::new(guid, address)))
    }

    pub fn get_max_guid(&self) -> Result<Guid, NodeError> {
        let conn = self.conn.lock().unwrap();
        let max: i64 = conn.query_row("SELECT COALESCE(MAX(guid), 0) FROM nodes", [], |row| {
            row.get(0)
        })?;
        Ok(Guid(max as u64))
    }

    pub fn get_max_guid_node(&self) -> Result<Node, NodeError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT guid, address FROM nodes WHERE guid = (SELECT MAX(guid) FROM nodes)",
            [],
            |row| {
                let guid: i64 = row.get(0)?;
                let address: String = row.get(1)?;
                Ok(Node::new(Guid(guid as u64), address))
            },
        )
        .map_err(NodeError::from)
    }

    pub fn get_client(&self) -> Result<Option<Node>, NodeError> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT guid, address FROM nodes WHERE is_client = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(guid, address)| Node::new(Guid(guid as u64), address)))
    }

    /// Single-shot: fails with [`NodeError::StoreConflict`] if the client is
    /// already set to a *different* GUID.
    pub fn set_client(&self, node: &Node) -> Result<(), NodeError> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<(i64, String)> = conn
            .query_row(
                "SELECT guid, address FROM nodes WHERE is_client = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((guid, _)) = existing {
            if guid as u64 != node.guid.0 {
                return Err(NodeError::StoreConflict(
                    "client identity already set to a different guid".into(),
                ));
            }
            return Ok(());
        }
        conn.execute(
            "INSERT INTO nodes (guid, address, is_client) VALUES (?1, ?2, 1)
             ON CONFLICT(guid) DO UPDATE SET is_client = 1, address = excluded.address",
            params![node.guid.0 as i64, node.address],
        )?;
        Ok(())
    }

    /// Atomically increment and return the message counter.
    pub fn incr_message_counter(&self) -> Result<u64, NodeError> {
        let conn = self.conn.lock().unwrap();
        let counter: i64 = conn.query_row(
            "UPDATE message_counter SET counter = counter + 1 WHERE id = 1 RETURNING counter",
            [],
            |row| row.get(0),
        )?;
        Ok(counter as u64)
    }

    /// Set the counter to `incoming` iff it's greater than the stored value.
    /// Returns whether the update happened.
    pub fn update_counter_if_greater(&self, incoming: u64) -> Result<bool, NodeError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE message_counter SET counter = ?1 WHERE id = 1 AND ?1 > counter",
            params![incoming as i64],
        )?;
        Ok(updated > 0)
    }

    /// Persist `(originator, message_id)` so duplicates can be detected past
    /// the counter gap. Optional per §9 — the forward/no-forward decision
    /// does not depend on this.
    pub fn record_seen(&self, originator: Guid, message_id: u64) -> Result<(), NodeError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO seen_messages (originator_guid, message_id) VALUES (?1, ?2)",
            params![originator.0 as i64, message_id as i64],
        )?;
        Ok(())
    }
}

fn existing_guid_for_address(conn: &Connection, address: &str) -> Result<Option<Guid>, NodeError> {
    let guid: Option<i64> = conn
        .query_row(
            "SELECT guid FROM nodes WHERE address = ?1",
            params![address],
            |row| row.get(0),
        )
        .optional()?;
    Ok(guid.map(|g| Guid(g as u64)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_node_is_monotonic_and_idempotent() {
        let store = NodeStore::open_memory().unwrap();
        let a = store.allocate_node("10.0.0.1:9000").unwrap();
        let b = store.allocate_node("10.0.0.2:9000").unwrap();
        assert_eq!(a.guid, Guid(1));
        assert_eq!(b.guid, Guid(2));

        // Idempotent re-allocation for the same address.
        let a_again = store.allocate_node("10.0.0.1:9000").unwrap();
        assert_eq!(a_again.guid, a.guid);
    }

    #[test]
    fn max_guid_tracks_allocations() {
        let store = NodeStore::open_memory().unwrap();
        assert_eq!(store.get_max_guid().unwrap(), Guid(0));
        store.allocate_node("a").unwrap();
        store.allocate_node("b").unwrap();
        assert_eq!(store.get_max_guid().unwrap(), Guid(2));
    }

    #[test]
    fn upsert_ignores_conflicting_rebind_outside_join() {
        let store = NodeStore::open_memory().unwrap();
        store.upsert_node(&Node::new(Guid(5), "1.2.3.4:1")).unwrap();
        store.upsert_node(&Node::new(Guid(5), "9.9.9.9:1")).unwrap();
        let node = store.get_node_by_guid(Guid(5)).unwrap().unwrap();
        assert_eq!(node.address, "1.2.3.4:1");
    }

    #[test]
    fn set_client_is_single_shot() {
        let store = NodeStore::open_memory().unwrap();
        let node = Node::new(Guid(1), "a");
        store.set_client(&node).unwrap();
        assert!(store.set_client(&node).is_ok());
        let other = Node::new(Guid(2), "b");
        assert!(store.set_client(&other).is_err());
    }

    // Property 5 from spec.md §8.
    #[test]
    fn update_counter_if_greater_only_first_crossing_wins() {
        let store = NodeStore::open_memory().unwrap();
        assert!(store.update_counter_if_greater(5).unwrap());
        assert!(!store.update_counter_if_greater(5).unwrap());
        assert!(!store.update_counter_if_greater(3).unwrap());
        assert!(store.update_counter_if_greater(6).unwrap());
    }

    // Property 4 from spec.md §8.
    #[tokio::test]
    async fn concurrent_increments_yield_contiguous_range() {
        let store = std::sync::Arc::new(NodeStore::open_memory().unwrap());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.incr_message_counter().unwrap() }));
        }
        let mut results: Vec<u64> = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        results.sort_unstable();
        assert_eq!(results, (1..=20).collect::<Vec<_>>());
    }
}
