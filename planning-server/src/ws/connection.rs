//! WebSocket connection handling
//!
//! `GET /api/ws?roomId=&name=&gamemaster=true` validates the join over plain
//! HTTP first so refusals get a real status code, then upgrades. Each socket
//! gets a writer task draining its outbound queue (with periodic pings) and a
//! reader loop feeding inbound messages to the room session manager.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use planning_core::{ClientMessage, Outcome, RoomError, ServerMessage};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::http::{api_error, room_error};

/// Interval between server pings on an idle socket
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Query parameters of the upgrade request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    pub room_id: Option<String>,
    pub name: Option<String>,
    pub gamemaster: Option<String>,
}

impl JoinParams {
    fn wants_game_master(&self) -> bool {
        self.gamemaster.as_deref() == Some("true")
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JoinParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let as_game_master = params.wants_game_master();
    let (Some(room_id), Some(name)) = (
        params.room_id.filter(|s| !s.is_empty()),
        params.name.filter(|s| !s.is_empty()),
    ) else {
        return api_error(StatusCode::BAD_REQUEST, "Missing roomId or name").into_response();
    };

    if !origin_allowed(state.allowed_origin.as_deref(), &headers) {
        warn!(room_id = %room_id, user = %name, "Rejected WebSocket origin");
        return api_error(StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }

    if let Err(e) = state.manager.check_join(&room_id, &name).await {
        debug!(room_id = %room_id, user = %name, error = %e, "Join refused");
        return room_error(e).into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, name, as_game_master))
}

fn origin_allowed(allowed: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(allowed) = allowed else {
        return true;
    };
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|origin| origin == allowed)
}

/// Handle an upgraded WebSocket for one user in one room
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_id: String,
    user: String,
    as_game_master: bool,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connection, rx) = state.manager.open_connection();
    let connection_id = connection.id().clone();

    // The name may have been taken between the check and the upgrade
    if let Err(e) = state
        .manager
        .join(&room_id, &user, as_game_master, connection.clone())
        .await
    {
        warn!(room_id = %room_id, user = %user, error = %e, "Join failed after upgrade");
        if let Ok(json) = ServerMessage::Error(e.to_string()).to_json() {
            let _ = ws_tx.send(Message::Text(json.into())).await;
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    info!(room_id = %room_id, user = %user, connection_id = %connection_id, "WebSocket client connected");

    let writer_stop = CancellationToken::new();
    let writer = tokio::spawn(write_loop(
        ws_tx,
        rx,
        writer_stop.clone(),
        state.shutdown.clone(),
    ));

    let mut left = false;
    loop {
        let msg = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            msg = ws_rx.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                Ok(message) => {
                    let is_leave = message == ClientMessage::Leave;
                    match state.manager.handle_message(&room_id, &user, message).await {
                        Ok(Outcome::Applied) if is_leave => {
                            left = true;
                            break;
                        }
                        Ok(_) => {}
                        Err(RoomError::RoomNotFound(_)) => {
                            info!(room_id = %room_id, user = %user, "Room no longer exists, closing socket");
                            break;
                        }
                        Err(e) => {
                            warn!(room_id = %room_id, user = %user, error = %e, "Error handling message");
                        }
                    }
                }
                Err(e) => {
                    debug!(room_id = %room_id, user = %user, error = %e, "Malformed message");
                    let reply = ServerMessage::Error(format!("invalid message: {e}"));
                    if let Ok(json) = reply.to_json() {
                        if connection.send(json).is_err() {
                            break;
                        }
                    }
                }
            },
            Some(Ok(Message::Close(_))) => {
                debug!(room_id = %room_id, user = %user, "WebSocket client sent close frame");
                break;
            }
            Some(Ok(_)) => {
                // Binary frames are ignored; ping/pong is handled by axum
            }
            Some(Err(e)) => {
                debug!(room_id = %room_id, user = %user, error = %e, "WebSocket error");
                break;
            }
            None => break,
        }
    }

    if !left {
        state.manager.disconnect(&room_id, &user, &connection_id);
    }

    writer_stop.cancel();
    let _ = writer.await;

    info!(room_id = %room_id, user = %user, connection_id = %connection_id, "WebSocket client disconnected");
}

/// Forward queued messages to the socket and ping on idle
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    stop: CancellationToken,
    shutdown: CancellationToken,
) {
    let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = shutdown.cancelled() => break,
            msg = rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                tracing::trace!("Sent ping");
            }
        }
    }

    let _ = ws_tx.send(Message::Close(None)).await;
}
