//! Error types for precache
//!
//! All modules use `PrecacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for precache operations
pub type PrecacheResult<T> = Result<T, PrecacheError>;

/// All errors that can occur in precache
#[derive(Error, Debug)]
pub enum PrecacheError {
    // Lifecycle errors
    #[error("Failed to precache {url}: {reason}")]
    InstallFetch { url: String, reason: String },

    #[error("Invalid worker state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("No worker registered. Run: precache install")]
    NotRegistered,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Cache storage errors
    #[error("Cache storage error while {context}: {reason}")]
    Storage { context: String, reason: String },

    // Manifest and URL errors
    #[error("Invalid asset path '{path}': {reason}")]
    InvalidAsset { path: String, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl PrecacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache storage error
    pub fn storage(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Storage {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an install failure for a single asset
    pub fn install_fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstallFetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// The host retries installation on its next load; nothing here retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InstallFetch { .. } | Self::Network(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InstallFetch { .. } => {
                Some("Check that every asset in worker.assets is reachable under worker.scope")
            }
            Self::NotRegistered => Some("Run: precache install --activate"),
            Self::InvalidState { .. } => Some("Run: precache status"),
            Self::ConfigInvalid { .. } => Some("Run: precache config show"),
            _ => None,
        }
    }
}
