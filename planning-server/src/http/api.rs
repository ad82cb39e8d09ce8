//! REST API handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use planning_core::RoomError;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Error body of every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a room error to its HTTP status
pub fn room_error(err: RoomError) -> ApiError {
    match &err {
        RoomError::InvalidInput(_) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        RoomError::RoomNotFound(_) => api_error(StatusCode::NOT_FOUND, "Room not found"),
        RoomError::UserAlreadyJoined { .. } => {
            api_error(StatusCode::CONFLICT, "Username already taken")
        }
        RoomError::Store(e) => {
            tracing::error!(error = %e, "Snapshot store failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Number of open WebSocket connections
    pub live_connections: usize,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        live_connections: state.live_connections(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub ticket_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
}

/// POST /api/create-room
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!(error = %e, "Rejected create-room body");
        api_error(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;

    if request.ticket_ids.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No tickets provided"));
    }

    let room_id = state
        .manager
        .create_room(request.ticket_ids)
        .await
        .map_err(room_error)?;

    Ok(Json(CreateRoomResponse { room_id }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRoomsResponse {
    pub deleted: usize,
}

/// DELETE /api/admin/rooms
pub async fn delete_all_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteRoomsResponse>, ApiError> {
    let deleted = state.manager.delete_all_rooms().await.map_err(room_error)?;
    Ok(Json(DeleteRoomsResponse { deleted }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub active_rooms: usize,
    pub total_users: usize,
    pub live_connections: usize,
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.manager.stats().await.map_err(room_error)?;
    Ok(Json(StatsResponse {
        active_rooms: stats.active_rooms,
        total_users: stats.total_users,
        live_connections: state.live_connections(),
    }))
}
