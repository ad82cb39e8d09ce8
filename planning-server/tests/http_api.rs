//! HTTP API integration tests
//!
//! These tests validate the REST surface with an in-process router:
//! - Health check and room creation
//! - Join validation before the WebSocket upgrade
//! - Admin endpoints guarded by the shared key

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use planning_server::http::{CreateRoomResponse, DeleteRoomsResponse, ErrorResponse, StatsResponse};
use planning_server::{AppState, create_router};
use serde_json::{Value, json};

fn create_test_server(state: AppState) -> (Arc<AppState>, TestServer) {
    let state = Arc::new(state);
    let server = TestServer::new(create_router(Arc::clone(&state))).unwrap();
    (state, server)
}

async fn create_room(server: &TestServer, tickets: &[&str]) -> String {
    let response = server
        .post("/api/create-room")
        .json(&json!({ "ticketIds": tickets }))
        .await;
    response.assert_status_ok();
    response.json::<CreateRoomResponse>().room_id
}

// ==================== Health ====================

#[tokio::test]
async fn health_reports_status_and_connections() {
    let (_state, server) = create_test_server(AppState::new_for_testing());

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["liveConnections"], 0);
    assert!(body["uptimeSeconds"].as_i64().unwrap() >= 0);
}

// ==================== Room Creation ====================

#[tokio::test]
async fn create_room_returns_loadable_id() {
    let (state, server) = create_test_server(AppState::new_for_testing());

    let room_id = create_room(&server, &["PROJ-1", "PROJ-2"]).await;

    let view = state.manager.room_view(&room_id).await.unwrap();
    assert_eq!(view.tickets.len(), 2);
    assert_eq!(view.tickets[0].id, "PROJ-1");
}

#[tokio::test]
async fn create_room_without_tickets_is_rejected() {
    let (_state, server) = create_test_server(AppState::new_for_testing());

    let response = server
        .post("/api/create-room")
        .json(&json!({ "ticketIds": [] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorResponse>().error, "No tickets provided");
}

#[tokio::test]
async fn create_room_with_bad_body_is_rejected() {
    let (_state, server) = create_test_server(AppState::new_for_testing());

    let response = server
        .post("/api/create-room")
        .json(&json!({ "tickets": ["A"] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorResponse>().error, "Invalid request body");
}

#[tokio::test]
async fn create_room_with_duplicate_ticket_is_rejected() {
    let (_state, server) = create_test_server(AppState::new_for_testing());

    let response = server
        .post("/api/create-room")
        .json(&json!({ "ticketIds": ["A", "A"] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ==================== Join Validation ====================

#[tokio::test]
async fn ws_join_validation_runs_before_upgrade() {
    let (state, server) = create_test_server(AppState::new_for_testing());
    let room_id = create_room(&server, &["A"]).await;

    server
        .get("/api/ws")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/ws?roomId=missing&name=alice")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (conn, _rx) = state.manager.open_connection();
    state
        .manager
        .join(&room_id, "alice", false, conn)
        .await
        .unwrap();

    let response = server
        .get(&format!("/api/ws?roomId={room_id}&name=alice"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<ErrorResponse>().error, "Username already taken");
}

// ==================== Admin ====================

#[tokio::test]
async fn admin_disabled_without_key() {
    let (_state, server) = create_test_server(AppState::new_for_testing());

    server
        .delete("/api/admin/rooms?key=anything")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/admin/stats")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_rejects_wrong_key() {
    let state = AppState::new_for_testing().with_admin_key(Some("secret".to_string()));
    let (_state, server) = create_test_server(state);

    server
        .delete("/api/admin/rooms?key=guess")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_stats_and_bulk_delete() {
    let state = AppState::new_for_testing().with_admin_key(Some("secret".to_string()));
    let (state, server) = create_test_server(state);
    let first = create_room(&server, &["A"]).await;
    create_room(&server, &["B", "C"]).await;

    let (conn, _rx) = state.manager.open_connection();
    state.manager.join(&first, "alice", true, conn).await.unwrap();

    let stats: StatsResponse = server.get("/api/admin/stats?key=secret").await.json();
    assert_eq!(stats.active_rooms, 2);
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.live_connections, 1);

    let response = server.delete("/api/admin/rooms?key=secret").await;
    response.assert_status_ok();
    assert_eq!(response.json::<DeleteRoomsResponse>().deleted, 2);

    server
        .get(&format!("/api/ws?roomId={first}&name=bob"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
