//! Serve command for running the planning server
//!
//! The serve command runs the planning server which provides:
//! - HTTP API for room creation and administration
//! - WebSocket for live room participation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use planning_core::{
    ConnectionRegistry, FileSnapshotStore, MemorySnapshotStore, RoomSessionManager,
    SessionConfig, SnapshotStore,
};
use planning_server::{PlanningServer, ServerConfig};
use tracing::info;

use crate::config::{ConfigLoader, PlanningConfig, StorageBackend};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Directory for room snapshots
    #[arg(long, conflicts_with = "memory")]
    pub data_dir: Option<PathBuf>,

    /// Keep rooms in memory only
    #[arg(long)]
    pub memory: bool,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = apply_args(ConfigLoader::load()?, &args);

    let store = open_store(&config).await?;
    let manager = Arc::new(RoomSessionManager::new(
        store,
        Arc::new(ConnectionRegistry::new()),
        session_config(&config),
    ));

    let server = PlanningServer::new(server_config(&config), manager);
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    info!(
        "Starting planning server on {}:{}",
        config.server.host, config.server.port
    );
    server.run().await?;
    Ok(())
}

/// Command-line flags override the config files
fn apply_args(mut config: PlanningConfig, args: &ServeArgs) -> PlanningConfig {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.backend = StorageBackend::File;
        config.storage.dir = dir.clone();
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }
    config
}

async fn open_store(config: &PlanningConfig) -> Result<Arc<dyn SnapshotStore>> {
    let store: Arc<dyn SnapshotStore> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory snapshot store");
            Arc::new(MemorySnapshotStore::new())
        }
        StorageBackend::File => {
            let dir = &config.storage.dir;
            let store = FileSnapshotStore::open(dir)
                .await
                .with_context(|| format!("opening snapshot store at {}", dir.display()))?;
            info!(dir = %dir.display(), "Using file snapshot store");
            Arc::new(store)
        }
    };
    Ok(store)
}

fn session_config(config: &PlanningConfig) -> SessionConfig {
    SessionConfig {
        send_queue: config.session.send_queue,
        disconnect_grace: config.session.disconnect_grace_secs.map(Duration::from_secs),
    }
}

fn server_config(config: &PlanningConfig) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        allowed_origin: config.server.allowed_origin.clone(),
        admin_key: config.admin.key.clone(),
        status_interval: match config.status.interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
    }
}
