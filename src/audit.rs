//! Audit log of worker lifecycle changes
//!
//! Appends one JSON object per line to `audit.log` in the state directory.
//! Covers installs, activations and cache clears; fetches are not recorded.

use crate::config::{schema::Config, ConfigManager};
use crate::worker::{ActivationReport, InstallReport};
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Append-only JSON lines log
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    pub fn with_path(path: PathBuf, enabled: bool) -> Self {
        Self { enabled, path }
    }

    pub async fn installed(&self, report: &InstallReport) {
        let assets: Vec<&str> = report.cached.iter().map(|url| url.as_str()).collect();
        self.log(
            "worker.installed",
            json!({
                "generation": report.generation,
                "assets": assets,
                "bytes": report.total_bytes,
            }),
        )
        .await;
    }

    pub async fn install_failed(&self, generation: &str, error: &str) {
        self.log(
            "worker.install_failed",
            json!({ "generation": generation, "error": error }),
        )
        .await;
    }

    pub async fn activated(&self, report: &ActivationReport) {
        self.log(
            "worker.activated",
            json!({ "generation": report.generation, "deleted": report.deleted }),
        )
        .await;
    }

    pub async fn cache_cleared(&self, deleted: &[String]) {
        self.log("cache.cleared", json!({ "deleted": deleted })).await;
    }

    /// Write one event; IO failures are logged and swallowed
    pub async fn log(&self, event: &str, data: serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize audit event {}: {}", event, e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
