//! Install step: precache the asset manifest

use crate::cache::CacheStorage;
use crate::error::{PrecacheError, PrecacheResult};
use crate::http::{Request, Response};
use crate::network::Network;
use crate::worker::manifest::WorkerSettings;
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Summary of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    pub cached: Vec<Url>,
    pub total_bytes: u64,
    /// Activate immediately instead of waiting for older workers' pages to close
    pub skip_waiting: bool,
}

/// Fetches every manifest asset and commits them as one batch
pub struct Installer {
    settings: Arc<WorkerSettings>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl Installer {
    pub fn new(
        settings: Arc<WorkerSettings>,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            settings,
            storage,
            network,
        }
    }

    /// Precache every asset, or nothing
    ///
    /// The cache is only opened once every fetch has succeeded. If the
    /// batch then fails to commit, a cache this call created is deleted
    /// again and an existing one keeps its previous entries.
    pub async fn install(&self) -> PrecacheResult<InstallReport> {
        let generation = &self.settings.generation;
        info!(
            "Installing generation {} ({} assets)",
            generation,
            self.settings.assets.len()
        );

        let fetched = try_join_all(
            self.settings
                .assets
                .iter()
                .map(|url| self.fetch_asset(url.clone())),
        )
        .await?;

        let total_bytes: u64 = fetched
            .iter()
            .map(|(_, response)| response.body.len() as u64)
            .sum();
        let cached: Vec<Url> = fetched
            .iter()
            .map(|(request, _)| request.url.clone())
            .collect();

        let existed = self.storage.has(generation).await?;
        let cache = self.storage.open(generation).await?;
        if let Err(e) = cache.put_all(fetched).await {
            if !existed {
                if let Err(cleanup) = self.storage.delete(generation).await {
                    warn!("Failed to remove empty cache {}: {}", generation, cleanup);
                }
            }
            return Err(e);
        }

        info!("Installed generation {}", generation);
        Ok(InstallReport {
            generation: generation.clone(),
            cached,
            total_bytes,
            skip_waiting: true,
        })
    }

    async fn fetch_asset(&self, url: Url) -> PrecacheResult<(Request, Response)> {
        let request = Request::get(url);
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| PrecacheError::install_fetch(request.url.as_str(), e.to_string()))?;

        if !response.is_ok() {
            return Err(PrecacheError::install_fetch(
                request.url.as_str(),
                format!("HTTP {} {}", response.status, response.status_text),
            ));
        }

        debug!(
            "Fetched {} ({} bytes)",
            request.url,
            response.body.len()
        );
        Ok((request, response))
    }
}
