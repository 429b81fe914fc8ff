//! Registry of live client connections

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::connection::{Connection, ConnectionId};

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub removed: usize,
}

/// Set of connections that are still writable
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new client connection
    pub async fn add(&self, connection: Connection) {
        let mut connections = self.connections.write().await;
        connections.insert(connection.id, connection);
    }

    /// Remove a connection. Returns false if it was already gone.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        connections.remove(id).is_some()
    }

    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Copy of the current membership; the lock is released on return
    pub async fn snapshot(&self) -> Vec<Connection> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Visit every live connection. Connections for which `visit` returns
    /// false are removed once the pass is over.
    pub async fn for_each<F>(&self, mut visit: F) -> BroadcastReport
    where
        F: FnMut(&Connection) -> bool,
    {
        let members = self.snapshot().await;

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for connection in &members {
            if visit(connection) {
                report.delivered += 1;
            } else {
                failed.push(connection.id);
            }
        }

        if !failed.is_empty() {
            let mut connections = self.connections.write().await;
            for id in failed {
                if connections.remove(&id).is_some() {
                    report.removed += 1;
                    log::info!("Removed unwritable connection {}", id);
                }
            }
        }

        report
    }

    /// Write the same text frame to every live connection
    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        self.for_each(|connection| connection.send_text(text)).await
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Shared reference to the registry
pub type SharedRegistry = Arc<ConnectionRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use warp::ws::Message;

    const QUEUE: usize = 4;

    fn connection() -> (Connection, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(QUEUE);
        let addr = "127.0.0.1:40000".parse().unwrap();
        (Connection::new(addr, tx), rx)
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connection();
        let id = conn.id;
        registry.add(conn).await;

        assert!(registry.remove(&id).await);
        assert!(!registry.remove(&id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_write_removes_only_that_connection() {
        let registry = ConnectionRegistry::new();
        let (alive, mut alive_rx) = connection();
        let (dead, dead_rx) = connection();
        let (other, mut other_rx) = connection();
        let dead_id = dead.id;
        registry.add(alive).await;
        registry.add(dead).await;
        registry.add(other).await;

        drop(dead_rx);

        let report = registry.broadcast("ping").await;
        assert_eq!(report, BroadcastReport { delivered: 2, removed: 1 });
        assert!(!registry.contains(&dead_id).await);
        assert_eq!(registry.len().await, 2);
        assert_eq!(alive_rx.recv().await.unwrap().to_str().unwrap(), "ping");
        assert_eq!(other_rx.recv().await.unwrap().to_str().unwrap(), "ping");
    }

    #[tokio::test]
    async fn test_broadcast_skips_connection_removed_by_handler() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (dead, dead_rx) = connection();
        let dead_id = dead.id;
        registry.add(dead).await;
        drop(dead_rx);

        // The handler noticed the disconnect first
        assert!(registry.remove(&dead_id).await);

        let report = registry.broadcast("late").await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_stalled_reader_is_removed_when_queue_fills() {
        let registry = ConnectionRegistry::new();
        let (stalled, _stalled_rx) = connection();
        let (reader, mut reader_rx) = connection();
        let stalled_id = stalled.id;
        registry.add(stalled).await;
        registry.add(reader).await;

        for i in 0..QUEUE {
            let report = registry.broadcast(&format!("msg {}", i)).await;
            assert_eq!(report, BroadcastReport { delivered: 2, removed: 0 });
            assert_eq!(reader_rx.recv().await.unwrap().to_str().unwrap(), format!("msg {}", i));
        }

        // Nobody drains the stalled queue, so the next frame does not fit
        let report = registry.broadcast("one too many").await;
        assert_eq!(report, BroadcastReport { delivered: 1, removed: 1 });
        assert!(!registry.contains(&stalled_id).await);
        assert_eq!(reader_rx.recv().await.unwrap().to_str().unwrap(), "one too many");

        let report = registry.broadcast("after").await;
        assert_eq!(report, BroadcastReport { delivered: 1, removed: 0 });
    }
}
