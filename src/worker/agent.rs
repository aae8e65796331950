//! The offline worker: lifecycle state plus the three event handlers

use crate::cache::CacheStorage;
use crate::error::{PrecacheError, PrecacheResult};
use crate::http::Request;
use crate::network::Network;
use crate::worker::activator::{ActivationReport, Activator};
use crate::worker::installer::{InstallReport, Installer};
use crate::worker::interceptor::{FetchOutcome, Interceptor};
use crate::worker::lifecycle::{EventOutcome, LifecycleEvent, WorkerState};
use crate::worker::manifest::WorkerSettings;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Offline cache proxy bound to one generation and scope
///
/// Storage and network are injected, so the same worker runs against the
/// disk store and real HTTP in the host, and against fakes in tests.
pub struct OfflineWorker {
    settings: Arc<WorkerSettings>,
    installer: Installer,
    activator: Activator,
    interceptor: Interceptor,
    state: RwLock<WorkerState>,
}

impl OfflineWorker {
    pub fn new(
        settings: WorkerSettings,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        let settings = Arc::new(settings);
        Self {
            installer: Installer::new(settings.clone(), storage.clone(), network.clone()),
            activator: Activator::new(settings.clone(), storage.clone()),
            interceptor: Interceptor::new(settings.clone(), storage, network),
            settings,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    /// Restore a previously persisted state
    pub fn with_state(self, state: WorkerState) -> Self {
        Self {
            state: RwLock::new(state),
            ..self
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn generation(&self) -> &str {
        &self.settings.generation
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Route a lifecycle event to its handler
    pub async fn dispatch(&self, event: LifecycleEvent) -> PrecacheResult<EventOutcome> {
        debug!("Dispatching {} event", event.name());
        match event {
            LifecycleEvent::Install => self.install().await.map(EventOutcome::Installed),
            LifecycleEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            LifecycleEvent::Fetch(request) => {
                Ok(EventOutcome::Fetched(self.handle_fetch(request).await))
            }
        }
    }

    /// Precache the manifest; on failure the worker becomes redundant
    pub async fn install(&self) -> PrecacheResult<InstallReport> {
        self.transition(
            WorkerState::can_install,
            "parsed, redundant or activated",
            WorkerState::Installing,
        )
        .await?;

        match self.installer.install().await {
            Ok(report) => {
                *self.state.write().await = WorkerState::Installed;
                Ok(report)
            }
            Err(e) => {
                warn!("Install of {} failed: {}", self.generation(), e);
                *self.state.write().await = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    /// Retire stale caches and start intercepting
    pub async fn activate(&self) -> PrecacheResult<ActivationReport> {
        let previous = self
            .transition(
                WorkerState::can_activate,
                "installed or activated",
                WorkerState::Activating,
            )
            .await?;

        match self.activator.activate().await {
            Ok(report) => {
                *self.state.write().await = WorkerState::Activated;
                info!("Worker {} controls all clients", self.generation());
                Ok(report)
            }
            Err(e) => {
                // Installed entries are intact; activation can be retried
                *self.state.write().await = previous;
                Err(e)
            }
        }
    }

    /// Handle a fetch event; requests are only intercepted once activated
    pub async fn handle_fetch(&self, request: Request) -> FetchOutcome {
        let state = self.state().await;
        if !state.intercepts_fetch() {
            debug!("Worker is {}, not intercepting {}", state, request.url);
            return FetchOutcome::Passthrough;
        }
        self.interceptor.handle(request).await
    }

    async fn transition(
        &self,
        allowed: impl Fn(&WorkerState) -> bool,
        expected: &str,
        next: WorkerState,
    ) -> PrecacheResult<WorkerState> {
        let mut state = self.state.write().await;
        if !allowed(&state) {
            return Err(PrecacheError::InvalidState {
                expected: expected.to_string(),
                actual: state.to_string(),
            });
        }
        debug!("Worker {}: {} -> {}", self.generation(), *state, next);
        Ok(std::mem::replace(&mut *state, next))
    }
}
