//! HTTP server module

mod api;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::middleware::admin_middleware;
use crate::ws;

pub use api::{
    ApiError, CreateRoomRequest, CreateRoomResponse, DeleteRoomsResponse, ErrorResponse,
    HealthResponse, StatsResponse, api_error, room_error,
};

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/api/admin/rooms", delete(api::delete_all_rooms))
        .route("/api/admin/stats", get(api::stats))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            admin_middleware,
        ));

    Router::new()
        .route("/health", get(api::health))
        .route("/api/create-room", post(api::create_room))
        .route("/api/ws", get(ws::ws_handler))
        .merge(admin)
        .layer(cors_layer(state.allowed_origin.as_deref()))
        .with_state(state)
}

/// CORS restricted to the configured origin, permissive when none is set
fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let Some(origin) = allowed_origin else {
        return CorsLayer::permissive();
    };

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Invalid allowed origin, cross-origin requests disabled");
            layer
        }
    }
}
