use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPlanningConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub storage: RawStorageConfig,

    #[serde(default)]
    pub session: RawSessionConfig,

    #[serde(default)]
    pub admin: RawAdminConfig,

    #[serde(default)]
    pub status: RawStatusConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStorageConfig {
    pub backend: Option<StorageBackend>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionConfig {
    pub send_queue: Option<usize>,
    /// Negative disables the automatic leave
    pub disconnect_grace_secs: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAdminConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStatusConfig {
    pub interval_secs: Option<u64>,
}

/// Where room snapshots live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub session: SessionSection,
    pub admin: AdminSection,
    pub status: StatusSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Origin allowed for CORS and WebSocket upgrades
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    pub backend: StorageBackend,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Outbound queue length per connection
    pub send_queue: usize,
    /// Seconds a disconnected user keeps their seat. `None` keeps it until they leave.
    pub disconnect_grace_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminSection {
    /// Enables the admin endpoints
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSection {
    /// Seconds between status lines, 0 disables them
    pub interval_secs: u64,
}

/// Default host for the planning server
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port for the planning server
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SEND_QUEUE: usize = 64;
pub const DEFAULT_DISCONNECT_GRACE_SECS: u64 = 120;
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 30;
