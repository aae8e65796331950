//! Configuration schema for precache
//!
//! Configuration is stored at `~/.config/precache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Worker generation, scope and precache manifest
    pub worker: WorkerConfig,

    /// Network transport settings
    pub network: NetworkConfig,

    /// Cache storage settings
    pub storage: StorageConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Worker settings
///
/// Bumping `generation` is the only way to force the precache to be
/// rebuilt: the next install writes a new cache and activation deletes
/// every cache with a different name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache generation identifier
    pub generation: String,

    /// Base URL the assets resolve against; also fixes the page origin
    pub scope: String,

    /// Relative asset paths to precache at install time
    pub assets: Vec<String>,

    /// Page served to failed navigations, relative to the scope
    pub offline_page: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            generation: "precache-v1".to_string(),
            scope: "http://localhost:8080/".to_string(),
            assets: vec!["index.html".to_string()],
            offline_page: "index.html".to_string(),
        }
    }
}

/// Network transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Overall timeout per request in seconds
    pub timeout_secs: u64,

    /// Largest response body read from the network
    pub max_body_bytes: u64,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
            user_agent: format!("precache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Cache storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend: "disk" or "memory"
    pub backend: String,

    /// Root directory for the disk backend (defaults to the state directory)
    pub dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "disk".to_string(),
            dir: None,
        }
    }
}
