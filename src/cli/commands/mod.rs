//! CLI command implementations

pub mod activate;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod install;
pub mod status;

pub use activate::execute as activate;
pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use status::execute as status;

use crate::audit::AuditLog;
use crate::cache::{create_storage, CacheStorage};
use crate::config::schema::WorkerConfig;
use crate::config::{Config, ConfigManager};
use crate::error::{PrecacheError, PrecacheResult};
use crate::network::{HttpNetwork, Network};
use crate::worker::{OfflineWorker, Registration, RegistrationStore, WorkerSettings};
use std::sync::Arc;

/// Shared wiring for commands that drive the worker
pub(crate) struct Host {
    pub worker_config: WorkerConfig,
    pub settings: WorkerSettings,
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub audit: AuditLog,
    pub registrations: RegistrationStore,
}

impl Host {
    pub fn new(config: &Config) -> PrecacheResult<Self> {
        Ok(Self {
            worker_config: config.worker.clone(),
            settings: WorkerSettings::from_config(&config.worker)?,
            storage: create_storage(&config.storage)?,
            network: Arc::new(HttpNetwork::new(&config.network)),
            audit: AuditLog::new(config),
            registrations: RegistrationStore::new(
                ConfigManager::registration_path(),
                ConfigManager::pending_registration_path(),
            ),
        })
    }

    /// Worker for a saved registration, resumed in its last state
    ///
    /// The registration's generation and scope win over the configured
    /// ones, so an older active worker keeps its own cache.
    pub fn worker_for(&self, registration: &Registration) -> PrecacheResult<OfflineWorker> {
        let settings = if registration.matches(
            &self.settings.generation,
            self.settings.scope.as_str(),
        ) {
            self.settings.clone()
        } else {
            WorkerSettings::from_config(&WorkerConfig {
                generation: registration.generation.clone(),
                scope: registration.scope.clone(),
                ..self.worker_config.clone()
            })?
        };

        Ok(
            OfflineWorker::new(settings, self.storage.clone(), self.network.clone())
                .with_state(registration.resume_state()),
        )
    }

    /// Saved registration for the configured generation and scope
    ///
    /// The pending slot is checked first, then the active one. Records left
    /// by a different configuration count as absent.
    pub async fn configured_registration(&self) -> PrecacheResult<Option<Registration>> {
        let generation = self.settings.generation.as_str();
        let scope = self.settings.scope.as_str();

        if let Some(pending) = self.registrations.pending().await? {
            if pending.matches(generation, scope) {
                return Ok(Some(pending));
            }
        }
        Ok(self
            .registrations
            .active()
            .await?
            .filter(|reg| reg.matches(generation, scope)))
    }

    /// Registration whose worker receives fetches
    ///
    /// The active worker if there is one, whatever the configured
    /// generation; otherwise a pending worker, which passes requests through.
    pub async fn serving_registration(&self) -> PrecacheResult<Registration> {
        if let Some(active) = self.registrations.active().await? {
            return Ok(active);
        }
        self.registrations
            .pending()
            .await?
            .ok_or(PrecacheError::NotRegistered)
    }
}
