//! Flush command: delete every stored room snapshot

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use planning_core::{FileSnapshotStore, ROOM_PREFIX, SnapshotStore};
use tracing::info;

use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct FlushArgs {
    /// Snapshot directory (defaults to the configured one)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

pub async fn run(args: FlushArgs) -> Result<()> {
    let dir = match args.data_dir {
        Some(dir) => dir,
        None => ConfigLoader::load()?.storage.dir,
    };

    let deleted = flush_rooms(&dir).await?;
    println!("Deleted {} rooms from {}", deleted, dir.display());
    Ok(())
}

/// Delete all `room:` snapshots under `dir`, returning how many were removed
pub async fn flush_rooms(dir: &std::path::Path) -> Result<usize> {
    let store = FileSnapshotStore::open(dir)
        .await
        .with_context(|| format!("opening snapshot store at {}", dir.display()))?;

    let keys = store.scan(ROOM_PREFIX).await?;
    let deleted = store.delete(&keys).await?;

    info!(event = "rooms_deleted", count = deleted, dir = %dir.display(), "Flushed room snapshots");
    Ok(deleted)
}
