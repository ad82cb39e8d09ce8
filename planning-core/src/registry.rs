//! Connection registry
//!
//! Process-wide map from `(room, user)` to the live outbound stream of that
//! user's socket. It outlives any single [`crate::Room`] value so that a room
//! rebuilt from a snapshot can be re-attached to the sockets that are still
//! open. Safe for concurrent insert, lookup and removal from any task.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SendError;

/// Unique identifier of one socket
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl Default for ConnectionId {
    fn default() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl ConnectionId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Writable half of a duplex connection
///
/// Cloning is cheap; all clones feed the same bounded queue, which the
/// transport's writer task drains into the socket.
#[derive(Clone, Debug)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
        }
    }

    /// Create a connection with a queue of `capacity` messages
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The receiving side is still held by a writer
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a message without waiting
    pub fn send(&self, message: String) -> Result<(), SendError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ConnectionKey {
    room_id: String,
    user: String,
}

impl ConnectionKey {
    fn new(room_id: &str, user: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            user: user.to_string(),
        }
    }
}

/// Registry of live connections keyed by room and user name
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionKey, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning the one it replaced
    pub fn register(&self, room_id: &str, user: &str, connection: Connection) -> Option<Connection> {
        self.connections
            .insert(ConnectionKey::new(room_id, user), connection)
    }

    /// Live connection for a user, if its socket is still open
    pub fn lookup(&self, room_id: &str, user: &str) -> Option<Connection> {
        self.connections
            .get(&ConnectionKey::new(room_id, user))
            .map(|entry| entry.value().clone())
            .filter(Connection::is_open)
    }

    pub fn is_live(&self, room_id: &str, user: &str) -> bool {
        self.lookup(room_id, user).is_some()
    }

    /// Remove the entry for a user only if it still belongs to `connection_id`
    ///
    /// A reconnect replaces the entry before the old socket finishes closing;
    /// the old socket's cleanup must not evict the new one.
    pub fn remove(&self, room_id: &str, user: &str, connection_id: &ConnectionId) -> bool {
        self.connections
            .remove_if(&ConnectionKey::new(room_id, user), |_, conn| {
                conn.id() == connection_id
            })
            .is_some()
    }

    /// Remove the entry for a user regardless of which socket owns it
    pub fn evict(&self, room_id: &str, user: &str) -> Option<Connection> {
        self.connections
            .remove(&ConnectionKey::new(room_id, user))
            .map(|(_, conn)| conn)
    }

    /// All open connections of a room, by user name
    pub fn connections_in(&self, room_id: &str) -> Vec<(String, Connection)> {
        self.connections
            .iter()
            .filter(|entry| entry.key().room_id == room_id && entry.value().is_open())
            .map(|entry| (entry.key().user.clone(), entry.value().clone()))
            .collect()
    }

    /// Drop every entry of a room. Returns how many were removed.
    pub fn remove_room(&self, room_id: &str) -> usize {
        let before = self.connections.len();
        self.connections.retain(|key, _| key.room_id != room_id);
        before.saturating_sub(self.connections.len())
    }

    pub fn clear(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }

    /// Number of registered connections
    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.0.starts_with("conn_"));
    }

    #[test]
    fn register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = Connection::channel(4);

        assert!(registry.register("r1", "alice", conn.clone()).is_none());

        let found = registry.lookup("r1", "alice").unwrap();
        assert_eq!(found.id(), conn.id());
        assert!(registry.lookup("r1", "bob").is_none());
        assert!(registry.lookup("r2", "alice").is_none());
    }

    #[test]
    fn lookup_skips_closed_connections() {
        let registry = ConnectionRegistry::new();
        let (conn, rx) = Connection::channel(4);
        registry.register("r1", "alice", conn);

        drop(rx);

        assert!(!registry.is_live("r1", "alice"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn remove_only_matching_connection() {
        let registry = ConnectionRegistry::new();
        let (old, _old_rx) = Connection::channel(4);
        let (new, _new_rx) = Connection::channel(4);

        registry.register("r1", "alice", old.clone());
        registry.register("r1", "alice", new.clone());

        assert!(!registry.remove("r1", "alice", old.id()));
        assert!(registry.is_live("r1", "alice"));

        assert!(registry.remove("r1", "alice", new.id()));
        assert!(!registry.is_live("r1", "alice"));
    }

    #[test]
    fn connections_in_room() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = Connection::channel(4);
        let (b, _b_rx) = Connection::channel(4);
        let (c, _c_rx) = Connection::channel(4);
        registry.register("r1", "alice", a);
        registry.register("r1", "bob", b);
        registry.register("r2", "carol", c);

        let mut users: Vec<String> = registry
            .connections_in("r1")
            .into_iter()
            .map(|(user, _)| user)
            .collect();
        users.sort();

        assert_eq!(users, vec!["alice", "bob"]);
        assert_eq!(registry.remove_room("r1"), 2);
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn send_reaches_receiver() {
        let (conn, mut rx) = Connection::channel(4);

        conn.send("hello".to_string()).unwrap();

        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_to_full_queue_fails() {
        let (conn, _rx) = Connection::channel(1);

        assert!(conn.send("one".to_string()).is_ok());
        assert_eq!(conn.send("two".to_string()), Err(SendError::Full));
    }

    #[test]
    fn send_to_closed_connection_fails() {
        let (conn, rx) = Connection::channel(1);
        drop(rx);
        assert_eq!(conn.send("late".to_string()), Err(SendError::Closed));
    }
}
