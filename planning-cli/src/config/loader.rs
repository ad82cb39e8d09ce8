use super::types::{
    AdminSection, DEFAULT_DISCONNECT_GRACE_SECS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SEND_QUEUE,
    DEFAULT_STATUS_INTERVAL_SECS, PlanningConfig, RawAdminConfig, RawPlanningConfig,
    RawServerConfig, RawSessionConfig, RawStatusConfig, RawStorageConfig, ServerSection,
    SessionSection, StatusSection, StorageSection,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Overrides the project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "PLANNING_PROJECT_CONFIG_DIR";
/// Overrides `[admin] key`
pub const ADMIN_KEY_ENV: &str = "PLANNING_ADMIN_KEY";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<PlanningConfig> {
        let user_path = Self::user_config_path();
        let project_path = Self::project_config_path();
        let mut config = Self::load_from(user_path.as_deref(), &project_path)?;

        if let Ok(key) = std::env::var(ADMIN_KEY_ENV)
            && !key.is_empty()
        {
            config.admin.key = Some(key);
        }
        Ok(config)
    }

    /// Load and merge the given layers; missing files are skipped
    pub fn load_from(user_path: Option<&Path>, project_path: &Path) -> Result<PlanningConfig> {
        let mut raw = RawPlanningConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user_path
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(user_path)?);
        }

        // Layer 2: Project config
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<RawPlanningConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "planning").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with PLANNING_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".planning/config.toml")
        }
    }

    /// Default snapshot directory (platform data dir)
    pub fn default_data_dir() -> PathBuf {
        ProjectDirs::from("", "", "planning")
            .map(|dirs| dirs.data_dir().join("rooms"))
            .unwrap_or_else(|| PathBuf::from(".planning/rooms"))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawPlanningConfig, overlay: RawPlanningConfig) -> RawPlanningConfig {
        RawPlanningConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                allowed_origin: overlay.server.allowed_origin.or(base.server.allowed_origin),
            },
            storage: RawStorageConfig {
                backend: overlay.storage.backend.or(base.storage.backend),
                dir: overlay.storage.dir.or(base.storage.dir),
            },
            session: RawSessionConfig {
                send_queue: overlay.session.send_queue.or(base.session.send_queue),
                disconnect_grace_secs: overlay
                    .session
                    .disconnect_grace_secs
                    .or(base.session.disconnect_grace_secs),
            },
            admin: RawAdminConfig {
                key: overlay.admin.key.or(base.admin.key),
            },
            status: RawStatusConfig {
                interval_secs: overlay.status.interval_secs.or(base.status.interval_secs),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawPlanningConfig) -> PlanningConfig {
        let disconnect_grace_secs = match raw.session.disconnect_grace_secs {
            None => Some(DEFAULT_DISCONNECT_GRACE_SECS),
            Some(secs) => u64::try_from(secs).ok(),
        };

        PlanningConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
                allowed_origin: raw.server.allowed_origin.filter(|o| !o.is_empty()),
            },
            storage: StorageSection {
                backend: raw.storage.backend.unwrap_or_default(),
                dir: raw.storage.dir.unwrap_or_else(Self::default_data_dir),
            },
            session: SessionSection {
                send_queue: raw.session.send_queue.unwrap_or(DEFAULT_SEND_QUEUE).max(1),
                disconnect_grace_secs,
            },
            admin: AdminSection {
                key: raw.admin.key.filter(|k| !k.is_empty()),
            },
            status: StatusSection {
                interval_secs: raw
                    .status
                    .interval_secs
                    .unwrap_or(DEFAULT_STATUS_INTERVAL_SECS),
            },
        }
    }
}
