//! Presence map: which users currently hold an open socket.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Sending half of one socket's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: u64,
    pub tx: mpsc::Sender<String>,
}

/// user id -> active connection. One socket per user; the latest registration wins.
#[derive(Debug)]
pub struct PresenceMap {
    conns: DashMap<Uuid, ConnectionHandle>,
    next_conn_id: AtomicU64,
    buffer: usize,
}

impl PresenceMap {
    /// `buffer` is the outbound queue capacity of each connection.
    pub fn new(buffer: usize) -> Self {
        Self {
            conns: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a socket for `user_id`, replacing any previous one.
    ///
    /// The caller owns the receiver and must call `unregister` with the returned
    /// `conn_id` when the socket closes. Replacing an entry drops the previous
    /// sender, so the replaced socket's receiver sees its queue close.
    pub fn register(&self, user_id: Uuid) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        let handle = ConnectionHandle { conn_id, tx };

        if let Some(previous) = self.conns.insert(user_id, handle.clone()) {
            tracing::debug!(
                user_id = %user_id,
                replaced_conn_id = previous.conn_id,
                conn_id,
                "Replaced existing connection"
            );
        }

        (handle, rx)
    }

    /// Remove the entry for `user_id` if it still belongs to `conn_id`.
    ///
    /// A late disconnect from a socket that was already replaced leaves the
    /// newer connection in place. Returns whether an entry was removed.
    pub fn unregister(&self, user_id: Uuid, conn_id: u64) -> bool {
        self.conns
            .remove_if(&user_id, |_, handle| handle.conn_id == conn_id)
            .is_some()
    }

    pub fn get(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.conns.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.conns.contains_key(&user_id)
    }

    /// Online user ids, sorted.
    pub fn online_users(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.conns.iter().map(|entry| *entry.key()).collect();
        users.sort();
        users
    }

    /// Snapshot of every handle, so callers can send without holding shard locks.
    pub fn handles(&self) -> Vec<(Uuid, ConnectionHandle)> {
        self.conns
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

impl Default for PresenceMap {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let presence = PresenceMap::new(4);
        let user = Uuid::new_v4();

        let (handle, _rx) = presence.register(user);
        assert!(presence.is_online(user));
        assert_eq!(presence.get(user).unwrap().conn_id, handle.conn_id);

        assert!(presence.unregister(user, handle.conn_id));
        assert!(!presence.is_online(user));
        assert!(presence.is_empty());
    }

    #[test]
    fn test_reconnect_replaces_and_stale_disconnect_is_ignored() {
        let presence = PresenceMap::new(4);
        let user = Uuid::new_v4();

        let (first, _rx1) = presence.register(user);
        let (second, _rx2) = presence.register(user);
        assert_ne!(first.conn_id, second.conn_id);
        assert_eq!(presence.len(), 1);

        // The first socket closes after being replaced
        assert!(!presence.unregister(user, first.conn_id));
        assert_eq!(presence.get(user).unwrap().conn_id, second.conn_id);

        assert!(presence.unregister(user, second.conn_id));
        assert!(!presence.is_online(user));
    }

    #[test]
    fn test_online_users_sorted() {
        let presence = PresenceMap::new(4);
        let mut users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let _receivers: Vec<_> = users.iter().map(|u| presence.register(*u).1).collect();

        users.sort();
        assert_eq!(presence.online_users(), users);
        assert_eq!(presence.handles().len(), 5);
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        let presence = PresenceMap::new(0);
        let (handle, _rx) = presence.register(Uuid::new_v4());
        assert!(handle.tx.try_send("x".to_string()).is_ok());
    }
}
