//! Activate step: retire caches from previous generations

use crate::cache::CacheStorage;
use crate::error::PrecacheResult;
use crate::worker::manifest::WorkerSettings;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Summary of an activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub generation: String,
    /// Stale cache names that were deleted
    pub deleted: Vec<String>,
    /// Take control of already-open pages without waiting for a reload
    pub clients_claimed: bool,
}

/// Deletes every cache that does not belong to the current generation
pub struct Activator {
    settings: Arc<WorkerSettings>,
    storage: Arc<dyn CacheStorage>,
}

impl Activator {
    pub fn new(settings: Arc<WorkerSettings>, storage: Arc<dyn CacheStorage>) -> Self {
        Self { settings, storage }
    }

    pub async fn activate(&self) -> PrecacheResult<ActivationReport> {
        let generation = &self.settings.generation;
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != generation)
            .collect();

        let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;

        let mut deleted = Vec::with_capacity(stale.len());
        for (name, result) in stale.into_iter().zip(results) {
            // false means someone else already removed it
            if result? {
                info!("Deleted stale cache {}", name);
                deleted.push(name);
            } else {
                debug!("Stale cache {} already gone", name);
            }
        }

        info!("Activated generation {}", generation);
        Ok(ActivationReport {
            generation: generation.clone(),
            deleted,
            clients_claimed: true,
        })
    }
}
