//! Registration record persistence
//!
//! The host process is short-lived, so the worker's lifecycle state is
//! written to disk between invocations. Two slots are kept: the active
//! worker that answers fetches, and the pending worker being installed.

use crate::error::{PrecacheError, PrecacheResult};
use crate::worker::lifecycle::WorkerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Persisted registration of one worker generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    /// Unique registration ID
    pub id: Uuid,

    /// Cache generation the worker owns
    pub generation: String,

    /// URL prefix the worker controls
    pub scope: String,

    /// Lifecycle state at last save
    pub state: WorkerState,

    pub installed_at: Option<DateTime<Utc>>,

    pub activated_at: Option<DateTime<Utc>>,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn new(generation: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation: generation.into(),
            scope: scope.into(),
            state: WorkerState::Parsed,
            installed_at: None,
            activated_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether this record describes the given worker configuration
    pub fn matches(&self, generation: &str, scope: &str) -> bool {
        self.generation == generation && self.scope == scope
    }

    /// Record a state change, stamping install and activation times
    pub fn record(&mut self, state: WorkerState) {
        let now = Utc::now();
        match state {
            WorkerState::Installed => self.installed_at = Some(now),
            WorkerState::Activated => self.activated_at = Some(now),
            _ => {}
        }
        self.state = state;
        self.updated_at = now;
    }

    /// State to restore into a worker
    ///
    /// A process that died mid-step leaves `installing` or `activating`
    /// behind; those roll back to the last completed state.
    pub fn resume_state(&self) -> WorkerState {
        match self.state {
            WorkerState::Installing => WorkerState::Redundant,
            WorkerState::Activating => WorkerState::Installed,
            other => other,
        }
    }

    /// Load the registration, if one was saved
    pub async fn load(path: &Path) -> PrecacheResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            PrecacheError::io(format!("reading registration {}", path.display()), e)
        })?;

        let registration: Registration = serde_json::from_str(&content)?;
        Ok(Some(registration))
    }

    pub async fn save(&self, path: &Path) -> PrecacheResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PrecacheError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await.map_err(|e| {
            PrecacheError::io(format!("writing registration {}", path.display()), e)
        })?;

        Ok(())
    }

    /// Remove the saved registration; missing files are not an error
    pub async fn delete(path: &Path) -> PrecacheResult<()> {
        if path.exists() {
            fs::remove_file(path).await.map_err(|e| {
                PrecacheError::io(format!("deleting registration {}", path.display()), e)
            })?;
        }
        Ok(())
    }
}

/// Active and pending registration slots
///
/// Installs only ever write the pending slot. The active slot changes when
/// a pending worker activates, so a failed install of a new generation
/// leaves the current worker serving.
#[derive(Debug, Clone)]
pub struct RegistrationStore {
    active_path: PathBuf,
    pending_path: PathBuf,
}

impl RegistrationStore {
    pub fn new(active_path: PathBuf, pending_path: PathBuf) -> Self {
        Self {
            active_path,
            pending_path,
        }
    }

    pub async fn active(&self) -> PrecacheResult<Option<Registration>> {
        Registration::load(&self.active_path).await
    }

    pub async fn pending(&self) -> PrecacheResult<Option<Registration>> {
        Registration::load(&self.pending_path).await
    }

    pub async fn save_pending(&self, registration: &Registration) -> PrecacheResult<()> {
        registration.save(&self.pending_path).await
    }

    /// Make an activated registration current and empty the pending slot
    pub async fn promote(&self, registration: &Registration) -> PrecacheResult<()> {
        if registration.state != WorkerState::Activated {
            return Err(PrecacheError::InvalidState {
                expected: "activated".to_string(),
                actual: registration.state.to_string(),
            });
        }
        registration.save(&self.active_path).await?;
        Registration::delete(&self.pending_path).await
    }

    pub async fn clear(&self) -> PrecacheResult<()> {
        Registration::delete(&self.pending_path).await?;
        Registration::delete(&self.active_path).await
    }
}
