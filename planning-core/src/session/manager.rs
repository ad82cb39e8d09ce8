//! RoomSessionManager for running estimation rooms
//!
//! Every operation reloads the room from the [`SnapshotStore`] and reattaches
//! live connections, applies the change under that room's own write lock,
//! then runs the same tail: persist, reconcile live connections, broadcast.
//! Rooms never share a lock, so unrelated rooms never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broadcast::{BroadcastReport, broadcast};
use crate::error::{RoomError, StoreError};
use crate::protocol::ClientMessage;
use crate::reconcile::reconcile;
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::room::{IgnoreReason, JoinRole, Outcome, ROOM_PREFIX, Room, RoomRecord, room_key};
use crate::store::SnapshotStore;

/// Last room value handed out for an id, guarded by that room's lock
type RoomSlot = Arc<RwLock<Option<Room>>>;

/// Tuning for connection handling
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound queue length per connection
    pub send_queue: usize,
    /// How long a disconnected user keeps their seat before leaving
    /// automatically. `None` keeps it until an explicit leave.
    pub disconnect_grace: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_queue: 64,
            disconnect_grace: Some(Duration::from_secs(120)),
        }
    }
}

/// Result of a successful join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub role: JoinRole,
    /// The user already had a seat and got their connection back
    pub reconnected: bool,
}

/// Counts reported by the status line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomStats {
    pub active_rooms: usize,
    pub total_users: usize,
}

/// Manages all rooms of this process
pub struct RoomSessionManager {
    store: Arc<dyn SnapshotStore>,
    registry: Arc<ConnectionRegistry>,
    rooms: RwLock<HashMap<String, RoomSlot>>,
    /// Disconnected users waiting for their grace period, by the socket that closed
    pending_leaves: DashMap<(String, String), ConnectionId>,
    config: SessionConfig,
}

impl RoomSessionManager {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        registry: Arc<ConnectionRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            registry,
            rooms: RwLock::new(HashMap::new()),
            pending_leaves: DashMap::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A new outbound connection sized by the configured queue length
    pub fn open_connection(&self) -> (Connection, tokio::sync::mpsc::Receiver<String>) {
        Connection::channel(self.config.send_queue)
    }

    // ==================== Room Lifecycle ====================

    /// Create and persist a room, returning its id
    pub async fn create_room(&self, ticket_ids: Vec<String>) -> Result<String, RoomError> {
        let id = Uuid::new_v4().to_string();
        let room = Room::create(id.clone(), ticket_ids)?;

        self.save(&room).await?;
        info!(
            event = "room_created",
            room_id = %id,
            tickets = room.tickets().len(),
            "Room created"
        );

        let slot = self.slot(&id).await;
        *slot.write().await = Some(room);
        Ok(id)
    }

    /// Current state of a room as it would be broadcast
    pub async fn room_view(&self, room_id: &str) -> Result<RoomRecord, RoomError> {
        let slot = self.slot(room_id).await;
        let guard = slot.read().await;
        let room = self.load(room_id, guard.as_ref()).await?;
        Ok(room.to_record())
    }

    /// Delete every room snapshot. The only operation that destroys rooms.
    pub async fn delete_all_rooms(&self) -> Result<usize, RoomError> {
        let keys = self.store.scan(ROOM_PREFIX).await?;
        let deleted = self.store.delete(&keys).await?;

        for key in &keys {
            if let Some(room_id) = key.strip_prefix(ROOM_PREFIX) {
                self.registry.remove_room(room_id);
            }
        }
        self.rooms.write().await.clear();
        self.pending_leaves.clear();

        info!(event = "rooms_deleted", count = deleted, "Deleted rooms");
        Ok(deleted)
    }

    /// Number of stored rooms and the users seated in them
    pub async fn stats(&self) -> Result<RoomStats, RoomError> {
        let keys = self.store.scan(ROOM_PREFIX).await?;
        let mut stats = RoomStats {
            active_rooms: keys.len(),
            total_users: 0,
        };

        for key in keys {
            match self.store.get(&key).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<RoomRecord>(&bytes) {
                    Ok(record) => stats.total_users += record.users.len(),
                    Err(e) => warn!(key = %key, error = %e, "Unreadable room snapshot"),
                },
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to read room snapshot"),
            }
        }

        Ok(stats)
    }

    // ==================== Connection Lifecycle ====================

    /// Validate a join without changing anything
    ///
    /// Lets the transport refuse a connection before upgrading it.
    pub async fn check_join(&self, room_id: &str, user: &str) -> Result<(), RoomError> {
        validate_user(user)?;
        let slot = self.slot(room_id).await;
        let guard = slot.read().await;
        self.load(room_id, guard.as_ref()).await?;

        if self.registry.is_live(room_id, user) {
            return Err(RoomError::UserAlreadyJoined {
                room_id: room_id.to_string(),
                user: user.to_string(),
            });
        }
        Ok(())
    }

    /// Seat `user` in the room and register their connection
    ///
    /// A name already seated but without a live connection is a reconnect:
    /// the seat and its votes are kept. A name with a live connection is
    /// refused.
    pub async fn join(
        &self,
        room_id: &str,
        user: &str,
        as_game_master: bool,
        connection: Connection,
    ) -> Result<JoinOutcome, RoomError> {
        validate_user(user)?;
        let slot = self.slot(room_id).await;
        let guard = slot.write().await;
        let mut room = self.load_live(room_id, guard.as_ref()).await?;

        if self.registry.is_live(room_id, user) {
            info!(room_id, user, "Username already taken");
            return Err(RoomError::UserAlreadyJoined {
                room_id: room_id.to_string(),
                user: user.to_string(),
            });
        }

        let reconnected = room.has_user(user);
        let role = room.join(user, as_game_master);
        self.registry.register(room_id, user, connection);
        self.pending_leaves
            .remove(&(room_id.to_string(), user.to_string()));

        match role {
            JoinRole::GameMaster if as_game_master => {
                info!(room_id, user, "Game master set for room")
            }
            JoinRole::GameMasterClaimIgnored => {
                info!(room_id, user, "Room already has a game master, joining as participant")
            }
            _ => {}
        }
        let event = if reconnected {
            "user_reconnected"
        } else {
            "user_joined"
        };
        info!(event, room_id, user, "User joined room");

        self.commit(room, guard).await;
        Ok(JoinOutcome { role, reconnected })
    }

    /// The socket of `user` closed
    ///
    /// The seat and votes stay. If a grace period is configured and the user
    /// has not reconnected when it runs out, they leave the room.
    pub fn disconnect(self: &Arc<Self>, room_id: &str, user: &str, connection_id: &ConnectionId) {
        if !self.registry.remove(room_id, user, connection_id) {
            debug!(room_id, user, connection_id = %connection_id, "Stale socket closed");
            return;
        }
        info!(event = "user_disconnected", room_id, user, "User disconnected");

        let Some(grace) = self.config.disconnect_grace else {
            return;
        };

        let key = (room_id.to_string(), user.to_string());
        self.pending_leaves.insert(key.clone(), connection_id.clone());

        let manager = Arc::clone(self);
        let connection_id = connection_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let expired = manager
                .pending_leaves
                .remove_if(&key, |_, pending| *pending == connection_id)
                .is_some();
            if !expired {
                return;
            }

            match manager.leave_if_disconnected(&key.0, &key.1).await {
                Ok(outcome) => debug!(
                    room_id = %key.0,
                    user = %key.1,
                    ?outcome,
                    "Grace period ended"
                ),
                Err(e) => warn!(
                    room_id = %key.0,
                    user = %key.1,
                    error = %e,
                    "Failed to remove disconnected user"
                ),
            }
        });
    }

    // ==================== Room Operations ====================

    /// Record an estimate on the current ticket
    pub async fn vote(
        &self,
        room_id: &str,
        user: &str,
        ticket_id: &str,
        value: i64,
    ) -> Result<Outcome, RoomError> {
        let outcome = self
            .mutate(room_id, |room| room.vote(user, ticket_id, value))
            .await?;
        if outcome.is_applied() {
            info!(event = "vote_recorded", room_id, user, ticket_id, vote = value, "Vote recorded");
        }
        Ok(outcome)
    }

    pub async fn reveal(&self, room_id: &str, user: &str) -> Result<Outcome, RoomError> {
        let outcome = self.mutate(room_id, |room| room.reveal(user)).await?;
        if outcome.is_applied() {
            info!(event = "votes_revealed", room_id, user, "Votes revealed");
        }
        Ok(outcome)
    }

    pub async fn advance(&self, room_id: &str, user: &str) -> Result<Outcome, RoomError> {
        let outcome = self.mutate(room_id, |room| room.advance(user)).await?;
        if outcome.is_applied() {
            info!(event = "ticket_changed", room_id, user, direction = "next", "Advanced ticket");
        }
        Ok(outcome)
    }

    pub async fn retreat(&self, room_id: &str, user: &str) -> Result<Outcome, RoomError> {
        let outcome = self.mutate(room_id, |room| room.retreat(user)).await?;
        if outcome.is_applied() {
            info!(event = "ticket_changed", room_id, user, direction = "previous", "Retreated ticket");
        }
        Ok(outcome)
    }

    /// Remove `user` from the room and forget their connection
    pub async fn leave(&self, room_id: &str, user: &str) -> Result<Outcome, RoomError> {
        let slot = self.slot(room_id).await;
        let guard = slot.write().await;
        let room = self.load_live(room_id, guard.as_ref()).await?;

        Ok(self.remove_seat(room, guard, user, true).await)
    }

    /// Grace-period expiry for a disconnected user
    ///
    /// Re-checked under the room lock: a user who reconnected (or whose newer
    /// socket already closed and started its own grace period) keeps the seat.
    /// Returns `None` when the user is no longer disconnected.
    async fn leave_if_disconnected(
        &self,
        room_id: &str,
        user: &str,
    ) -> Result<Option<Outcome>, RoomError> {
        let slot = self.slot(room_id).await;
        let guard = slot.write().await;

        let key = (room_id.to_string(), user.to_string());
        if self.registry.is_live(room_id, user) || self.pending_leaves.contains_key(&key) {
            debug!(room_id, user, "User reconnected before grace period ended");
            return Ok(None);
        }

        let room = self.load_live(room_id, guard.as_ref()).await?;
        Ok(Some(self.remove_seat(room, guard, user, false).await))
    }

    async fn remove_seat(
        &self,
        mut room: Room,
        guard: RwLockWriteGuard<'_, Option<Room>>,
        user: &str,
        evict: bool,
    ) -> Outcome {
        let room_id = room.id().to_string();
        let outcome = room.leave(user);
        if let Outcome::Ignored(reason) = outcome {
            debug!(room_id = %room_id, user, reason = %reason, "Leave ignored");
            return outcome;
        }

        // Evicted before commit so reconciliation does not seat the user again
        if evict {
            self.registry.evict(&room_id, user);
        }
        if room.game_master().is_none() {
            debug!(room_id = %room_id, "Game master role vacant");
        }
        info!(event = "user_left", room_id = %room_id, user, "User left room");
        self.commit(room, guard).await;
        outcome
    }

    /// Apply one inbound client message
    pub async fn handle_message(
        &self,
        room_id: &str,
        user: &str,
        message: ClientMessage,
    ) -> Result<Outcome, RoomError> {
        let outcome = match message {
            ClientMessage::Vote {
                ticket_id,
                vote: Some(value),
            } => self.vote(room_id, user, &ticket_id, value).await?,
            ClientMessage::Vote { vote: None, .. } | ClientMessage::MalformedVote => {
                Outcome::Ignored(IgnoreReason::InvalidVote)
            }
            ClientMessage::Reveal => self.reveal(room_id, user).await?,
            ClientMessage::Next => self.advance(room_id, user).await?,
            ClientMessage::Previous => self.retreat(room_id, user).await?,
            ClientMessage::Leave => self.leave(room_id, user).await?,
            ClientMessage::Unknown(kind) => {
                info!(room_id, user, message_type = %kind, "Unknown message type");
                Outcome::Ignored(IgnoreReason::UnsupportedMessage)
            }
        };

        if let Outcome::Ignored(reason) = outcome {
            info!(room_id, user, reason = %reason, "Ignored message");
        }
        Ok(outcome)
    }

    // ==================== Internals ====================

    async fn slot(&self, room_id: &str) -> RoomSlot {
        if let Some(slot) = self.rooms.read().await.get(room_id) {
            return Arc::clone(slot);
        }
        let mut rooms = self.rooms.write().await;
        Arc::clone(rooms.entry(room_id.to_string()).or_default())
    }

    /// Load a fresh copy of the room from the store
    ///
    /// When the store cannot be reached, the last copy this process held is
    /// used so connected users can keep going.
    async fn load(&self, room_id: &str, cached: Option<&Room>) -> Result<Room, RoomError> {
        match self.store.get(&room_key(room_id)).await {
            Ok(Some(bytes)) => {
                let record: RoomRecord =
                    serde_json::from_slice(&bytes).map_err(StoreError::from)?;
                Room::from_record(record)
            }
            Ok(None) => {
                // Forget slots created by lookups of unknown ids
                self.rooms.write().await.remove(room_id);
                Err(RoomError::RoomNotFound(room_id.to_string()))
            }
            Err(e) => match cached {
                Some(room) => {
                    warn!(room_id, error = %e, "Snapshot store unavailable, using in-memory room");
                    Ok(room.clone())
                }
                None => Err(e.into()),
            },
        }
    }

    /// Load the room and attach every live connection to it
    ///
    /// Users whose seat a concurrent writer dropped are seated again before
    /// the operation runs, so their actions are not refused.
    async fn load_live(&self, room_id: &str, cached: Option<&Room>) -> Result<Room, RoomError> {
        let mut room = self.load(room_id, cached).await?;
        reconcile(&mut room, &self.registry);
        Ok(room)
    }

    async fn save(&self, room: &Room) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&room.to_record())?;
        self.store.set(&room_key(room.id()), bytes).await
    }

    /// Load, apply `op`, and commit unless the change was refused
    async fn mutate<F>(&self, room_id: &str, op: F) -> Result<Outcome, RoomError>
    where
        F: FnOnce(&mut Room) -> Outcome,
    {
        let slot = self.slot(room_id).await;
        let guard = slot.write().await;
        let mut room = self.load_live(room_id, guard.as_ref()).await?;

        let outcome = op(&mut room);
        if outcome.is_applied() {
            self.commit(room, guard).await;
        }
        Ok(outcome)
    }

    /// Persist, reconcile, broadcast. Persistence failures are logged and
    /// the broadcast still goes out.
    async fn commit(
        &self,
        mut room: Room,
        mut guard: RwLockWriteGuard<'_, Option<Room>>,
    ) -> BroadcastReport {
        if let Err(e) = self.save(&room).await {
            error!(room_id = %room.id(), error = %e, "Failed to persist room");
        }

        let report = reconcile(&mut room, &self.registry);
        if !report.restored.is_empty() {
            if let Err(e) = self.save(&room).await {
                error!(room_id = %room.id(), error = %e, "Failed to persist restored users");
            }
        }

        *guard = Some(room);
        let guard = guard.downgrade();
        match guard.as_ref() {
            Some(room) => broadcast(room),
            None => BroadcastReport::default(),
        }
    }
}

fn validate_user(user: &str) -> Result<(), RoomError> {
    if user.trim().is_empty() {
        return Err(RoomError::InvalidInput("user name is empty".to_string()));
    }
    Ok(())
}
