//! planning-core: Core library for planning, a real-time estimation room server
//!
//! This crate holds everything that does not touch a socket:
//!
//! - **Rooms** - [`Room`] with its invariant-preserving mutators and the
//!   [`RoomRecord`] snapshot format
//! - **Connections** - [`ConnectionRegistry`] mapping `(room, user)` to a live
//!   outbound [`Connection`]
//! - **Persistence** - the [`SnapshotStore`] trait with file and in-memory backends
//! - **Sessions** - [`RoomSessionManager`], which runs every room operation as
//!   load, mutate, persist, reconcile, broadcast
//! - **Protocol** - the JSON envelopes exchanged over the WebSocket
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use planning_core::{ConnectionRegistry, MemorySnapshotStore, RoomSessionManager, SessionConfig};
//!
//! async fn example() -> Result<(), planning_core::RoomError> {
//!     let manager = RoomSessionManager::new(
//!         Arc::new(MemorySnapshotStore::new()),
//!         Arc::new(ConnectionRegistry::new()),
//!         SessionConfig::default(),
//!     );
//!
//!     let room_id = manager.create_room(vec!["PROJ-1".into(), "PROJ-2".into()]).await?;
//!     let (conn, _rx) = manager.open_connection();
//!     manager.join(&room_id, "alice", true, conn).await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod error;
pub mod protocol;
pub mod reconcile;
pub mod registry;
pub mod room;
pub mod session;
pub mod store;

// Re-export key types for convenience
pub use broadcast::{BroadcastReport, broadcast};
pub use error::{RoomError, SendError, StoreError};
pub use protocol::{ClientMessage, Envelope, ServerMessage};
pub use reconcile::{ReconcileReport, reconcile};
pub use registry::{Connection, ConnectionId, ConnectionRegistry};
pub use room::{IgnoreReason, JoinRole, Outcome, ROOM_PREFIX, Room, RoomRecord, Ticket, User, room_key};
pub use session::{JoinOutcome, RoomSessionManager, RoomStats, SessionConfig};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
