//! The presence registry: who is online, and how to reach them.

use std::collections::HashMap;

use parley_transport::ConnectionId;
use tokio::sync::RwLock;

use crate::Outbound;

/// Maps each logged-in username to its connection's [`Outbound`] handle.
///
/// This is the only mutable state shared by every connection task. All
/// access goes through one `RwLock` and the methods below; the map itself
/// is never handed out, so the locking discipline is all in this file.
/// No lock is held across an `.await` on anything else.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<String, Outbound>>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `handle` as the live connection for `username`.
    ///
    /// Overwrites any prior entry and returns it. The previous connection
    /// is not closed; it simply stops receiving direct messages.
    pub async fn register(&self, username: &str, handle: Outbound) -> Option<Outbound> {
        let conn_id = handle.conn_id();
        let previous = self
            .entries
            .write()
            .await
            .insert(username.to_string(), handle);

        match &previous {
            Some(old) if old.conn_id() != conn_id => tracing::info!(
                %username,
                %conn_id,
                replaced = %old.conn_id(),
                "presence replaced by newer login"
            ),
            _ => tracing::debug!(%username, %conn_id, "presence registered"),
        }
        previous
    }

    /// Returns the handle for `username`, if online.
    pub async fn lookup(&self, username: &str) -> Option<Outbound> {
        self.entries.read().await.get(username).cloned()
    }

    /// Removes the entry for `username`. Safe to call when absent.
    pub async fn unregister(&self, username: &str) -> Option<Outbound> {
        let removed = self.entries.write().await.remove(username);
        if let Some(handle) = &removed {
            tracing::debug!(%username, conn_id = %handle.conn_id(), "presence removed");
        }
        removed
    }

    /// Removes the entry for `username` only if it belongs to `conn_id`.
    ///
    /// A connection tearing itself down uses this so it cannot remove the
    /// entry of a newer login of the same user on another connection.
    /// Returns `true` if an entry was removed.
    pub async fn unregister_if(&self, username: &str, conn_id: ConnectionId) -> bool {
        let mut entries = self.entries.write().await;
        if entries.get(username).is_some_and(|h| h.conn_id() == conn_id) {
            entries.remove(username);
            tracing::debug!(%username, %conn_id, "presence removed");
            true
        } else {
            false
        }
    }

    /// Returns `true` if `username` has a live entry.
    pub async fn contains(&self, username: &str) -> bool {
        self.entries.read().await.contains_key(username)
    }

    /// A point-in-time list of `(username, connection)` pairs.
    pub async fn snapshot(&self) -> Vec<(String, ConnectionId)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(name, handle)| (name.clone(), handle.conn_id()))
            .collect()
    }

    /// Number of users online.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nobody is online.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn handle(id: u64) -> Outbound {
        // The receiver is dropped; the registry never writes to handles.
        Outbound::channel(ConnectionId::new(id), 1).0
    }

    #[tokio::test]
    async fn test_register_then_lookup() {
        let registry = PresenceRegistry::new();
        registry.register("alice", handle(1)).await;

        let found = registry.lookup("alice").await.expect("alice is online");
        assert_eq!(found.conn_id(), ConnectionId::new(1));
        assert!(registry.lookup("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_register_overwrites_and_returns_previous() {
        let registry = PresenceRegistry::new();
        assert!(registry.register("alice", handle(1)).await.is_none());

        let previous = registry.register("alice", handle(2)).await;

        assert_eq!(previous.map(|h| h.conn_id()), Some(ConnectionId::new(1)));
        assert_eq!(
            registry.lookup("alice").await.map(|h| h.conn_id()),
            Some(ConnectionId::new(2))
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let registry = PresenceRegistry::new();

        assert!(registry.unregister("ghost").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_if_ignores_other_connection() {
        let registry = PresenceRegistry::new();
        registry.register("alice", handle(1)).await;
        registry.register("alice", handle(2)).await;

        // The first connection disconnects after being replaced.
        assert!(!registry.unregister_if("alice", ConnectionId::new(1)).await);
        assert!(registry.contains("alice").await);

        assert!(registry.unregister_if("alice", ConnectionId::new(2)).await);
        assert!(!registry.contains("alice").await);
    }

    #[tokio::test]
    async fn test_snapshot_lists_entries() {
        let registry = PresenceRegistry::new();
        registry.register("alice", handle(1)).await;
        registry.register("bob", handle(2)).await;

        let mut snapshot = registry.snapshot().await;
        snapshot.sort();

        assert_eq!(
            snapshot,
            vec![
                ("alice".to_string(), ConnectionId::new(1)),
                ("bob".to_string(), ConnectionId::new(2)),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister_keeps_map_consistent() {
        let registry = Arc::new(PresenceRegistry::new());

        let mut tasks = Vec::new();
        for i in 0..64u64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let name = format!("user{}", i % 8);
                registry.register(&name, handle(i)).await;
                if i % 2 == 0 {
                    registry.unregister_if(&name, ConnectionId::new(i)).await;
                }
                registry.lookup(&name).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // At most one entry per name survives, whatever the interleaving.
        assert!(registry.len().await <= 8);
        for (name, conn_id) in registry.snapshot().await {
            assert_eq!(
                registry.lookup(&name).await.map(|h| h.conn_id()),
                Some(conn_id)
            );
        }
    }
}
