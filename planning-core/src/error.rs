//! Error types for planning-core

use thiserror::Error;

/// Errors surfaced by room operations
///
/// Policy rejections (a non game master revealing, a vote for a stale
/// ticket, ...) are not errors; see [`crate::Outcome`].
#[derive(Error, Debug)]
pub enum RoomError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("User {user} already joined room {room_id}")]
    UserAlreadyJoined { room_id: String, user: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from a snapshot store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors when pushing a message onto a live connection
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("Send queue full")]
    Full,

    #[error("Connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_error_not_found_displays_correctly() {
        let error = RoomError::RoomNotFound("abc123".to_string());
        assert!(error.to_string().contains("Room not found"));
        assert!(error.to_string().contains("abc123"));
    }

    #[test]
    fn room_error_user_already_joined_displays_correctly() {
        let error = RoomError::UserAlreadyJoined {
            room_id: "r1".to_string(),
            user: "alice".to_string(),
        };
        assert!(error.to_string().contains("alice"));
        assert!(error.to_string().contains("r1"));
    }

    #[test]
    fn store_error_unavailable_displays_correctly() {
        let error = StoreError::Unavailable("connection refused".to_string());
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn room_error_converts_from_store_error() {
        let store_error = StoreError::Unavailable("down".to_string());
        let room_error: RoomError = store_error.into();
        assert!(matches!(room_error, RoomError::Store(_)));
    }

    #[test]
    fn send_error_displays_correctly() {
        assert!(SendError::Full.to_string().contains("full"));
        assert!(SendError::Closed.to_string().contains("closed"));
    }
}
