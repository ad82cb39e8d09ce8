//! planning-server - HTTP and WebSocket server for planning rooms
//!
//! This crate owns the transport: room creation over REST, one WebSocket per
//! participant, the admin endpoints, and the periodic status line. All room
//! semantics live in `planning-core`.

mod error;
pub mod http;
pub mod middleware;
mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use planning_core::RoomSessionManager;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use http::create_router;
pub use middleware::admin_middleware;
pub use state::AppState;

/// The main planning server
pub struct PlanningServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl PlanningServer {
    /// Create a server around an existing room session manager
    pub fn new(config: ServerConfig, manager: Arc<RoomSessionManager>) -> Self {
        let state = AppState::new(manager)
            .with_allowed_origin(config.allowed_origin.clone())
            .with_admin_key(config.admin_key.clone());
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Create a server with custom state (for testing)
    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Token that stops the server and closes every socket when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("planning server listening on {}", addr);
        self.run_with_listener(listener).await
    }

    /// Run the server on an already bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let status = self.start_status_reporter();
        let shutdown = self.state.shutdown.clone();

        let router = create_router(Arc::clone(&self.state));
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        self.state.shutdown.cancel();
        if let Some(handle) = status {
            let _ = handle.await;
        }
        tracing::info!("planning server stopped");
        result
    }

    /// Start a background task that logs room and user counts
    fn start_status_reporter(&self) -> Option<JoinHandle<()>> {
        let interval = self.config.status_interval?;
        let state = Arc::clone(&self.state);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = state.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match state.manager.stats().await {
                            Ok(stats) => tracing::info!(
                                active_rooms = stats.active_rooms,
                                total_users = stats.total_users,
                                live_connections = state.live_connections(),
                                "Status"
                            ),
                            Err(e) => tracing::warn!(error = %e, "Failed to collect room stats"),
                        }
                    }
                }
            }
        }))
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Origin allowed for CORS and WebSocket upgrades
    pub allowed_origin: Option<String>,
    /// Shared key for the admin endpoints
    pub admin_key: Option<String>,
    /// How often the status line is logged. `None` disables it.
    pub status_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origin: None,
            admin_key: None,
            status_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:8080")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
