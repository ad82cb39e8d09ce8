//! Shared-key guard for the admin endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AdminKeyQuery {
    pub key: Option<String>,
}

/// Reject the request unless `?key=` matches the configured admin key
///
/// With no key configured the admin endpoints are disabled entirely.
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminKeyQuery>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !key_matches(state.admin_key.as_deref(), query.key.as_deref()) {
        tracing::debug!(path = %request.uri().path(), "Rejected admin request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

fn key_matches(configured: Option<&str>, provided: Option<&str>) -> bool {
    match (configured, provided) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    }
}
