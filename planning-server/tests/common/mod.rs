//! Shared test utilities for planning-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use planning_server::{AppState, PlanningServer, ServerConfig};

/// Creates a test server with in-memory storage, returns state and address
#[allow(dead_code)]
pub async fn create_test_server() -> (Arc<AppState>, SocketAddr) {
    create_test_server_with_state(AppState::new_for_testing()).await
}

/// Creates a test server around custom state
#[allow(dead_code)]
pub async fn create_test_server_with_state(state: AppState) -> (Arc<AppState>, SocketAddr) {
    let state = Arc::new(state);
    let config = ServerConfig {
        status_interval: None,
        ..ServerConfig::new("127.0.0.1", 0)
    };

    let server = PlanningServer::with_state(config, Arc::clone(&state));
    let addr = spawn_server(server).await;

    (state, addr)
}

/// Creates a room with the given ticket ids
#[allow(dead_code)]
pub async fn create_room(state: &AppState, tickets: &[&str]) -> String {
    state
        .manager
        .create_room(tickets.iter().map(|t| t.to_string()).collect())
        .await
        .unwrap()
}

/// Waits until the server has dropped the live connection of `user`
#[allow(dead_code)]
pub async fn wait_for_disconnect(state: &AppState, room_id: &str, user: &str) {
    for _ in 0..200 {
        if !state.manager.registry().is_live(room_id, user) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{user} still connected to {room_id}");
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: PlanningServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(Duration::from_millis(10)).await;

    addr
}
