//! Room session management

pub mod manager;

// Re-export key types for convenience
pub use manager::{JoinOutcome, RoomSessionManager, RoomStats, SessionConfig};
