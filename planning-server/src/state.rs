//! Shared application state for the planning server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use planning_core::{ConnectionRegistry, MemorySnapshotStore, RoomSessionManager, SessionConfig};
use tokio_util::sync::CancellationToken;

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Runs every room operation
    pub manager: Arc<RoomSessionManager>,
    /// Only origin allowed for CORS and WebSocket upgrades. `None` allows any.
    pub allowed_origin: Option<String>,
    /// Key required by the admin endpoints. `None` disables them.
    pub admin_key: Option<String>,
    /// Cancelled when the server shuts down; open sockets close on it
    pub shutdown: CancellationToken,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(manager: Arc<RoomSessionManager>) -> Self {
        Self {
            manager,
            allowed_origin: None,
            admin_key: None,
            shutdown: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    /// State backed by an in-memory store with no disconnect grace period
    pub fn new_for_testing() -> Self {
        let manager = RoomSessionManager::new(
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(ConnectionRegistry::new()),
            SessionConfig {
                disconnect_grace: None,
                ..SessionConfig::default()
            },
        );
        Self::new(Arc::new(manager))
    }

    pub fn with_allowed_origin(mut self, origin: Option<String>) -> Self {
        self.allowed_origin = origin.filter(|o| !o.is_empty());
        self
    }

    pub fn with_admin_key(mut self, key: Option<String>) -> Self {
        self.admin_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// Number of sockets currently registered
    pub fn live_connections(&self) -> usize {
        self.manager.registry().count()
    }
}
