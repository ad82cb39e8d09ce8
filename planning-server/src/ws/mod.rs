//! WebSocket module for room connections

mod connection;

pub use connection::{JoinParams, ws_handler};
