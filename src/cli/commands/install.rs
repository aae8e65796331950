//! Install command - precache the configured generation

use crate::cache::format_bytes;
use crate::cli::args::InstallArgs;
use crate::cli::commands::{activate, Host};
use crate::config::Config;
use crate::error::PrecacheResult;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{Registration, WorkerState};
use tracing::debug;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> PrecacheResult<()> {
    let ctx = UiContext::detect();
    let host = Host::new(config)?;
    install_worker(&ctx, &host, args.activate).await
}

/// Install the configured generation into the pending slot
///
/// The active worker is left alone unless `activate` is set and the
/// install succeeded.
pub(crate) async fn install_worker(
    ctx: &UiContext,
    host: &Host,
    activate: bool,
) -> PrecacheResult<()> {
    let generation = host.settings.generation.clone();
    ui::intro(ctx, &format!("Installing {}", generation));

    let mut registration = match host.configured_registration().await? {
        Some(reg) => reg,
        None => {
            debug!("Starting a new registration for {}", generation);
            Registration::new(&generation, host.settings.scope.as_str())
        }
    };
    let worker = host.worker_for(&registration)?;

    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!(
        "Precaching {} asset(s)",
        host.settings.assets.len()
    ));

    let report = match worker.install().await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Install failed");
            // InvalidState leaves the worker untouched; only real failures are recorded
            if worker.state().await == WorkerState::Redundant {
                registration.record(WorkerState::Redundant);
                host.registrations.save_pending(&registration).await?;
                host.audit.install_failed(&generation, &e.to_string()).await;
            }
            if e.is_retryable() {
                ui::step_error(ctx, "Nothing was cached; rerun once every asset is reachable");
            }
            return Err(e);
        }
    };

    spinner.stop(&format!(
        "Precached {} asset(s), {}",
        report.cached.len(),
        format_bytes(report.total_bytes)
    ));
    for url in &report.cached {
        ui::remark(ctx, url.as_str());
    }

    registration.record(WorkerState::Installed);
    host.registrations.save_pending(&registration).await?;
    host.audit.installed(&report).await;

    if activate {
        activate::activate_worker(ctx, host, &worker, &mut registration).await?;
        ui::outro_success(ctx, &format!("{} is active", generation));
    } else {
        ui::outro_success(ctx, &format!("{} installed", generation));
        ui::remark(ctx, "Run: precache activate");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStorage, MemoryStorage};
    use crate::cli::commands::fetch::fetch_through;
    use crate::cli::commands::tests::{host, site, SCOPE};
    use crate::error::PrecacheError;
    use crate::http::Request;
    use crate::testing::ScriptedNetwork;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn page(path: &str) -> Request {
        Request::parse(&format!("{}{}", SCOPE, path)).unwrap()
    }

    #[tokio::test]
    async fn failed_upgrade_keeps_serving_previous_generation() {
        let ctx = UiContext::non_interactive();
        let state = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());

        let v9 = host("v9", storage.clone(), site("v9"), &state);
        install_worker(&ctx, &v9, true).await.unwrap();

        // v10 cannot reach its assets
        let v10 = host("v10", storage.clone(), Arc::new(ScriptedNetwork::new()), &state);
        let err = install_worker(&ctx, &v10, true).await.unwrap_err();
        assert!(matches!(err, PrecacheError::InstallFetch { .. }));

        let active = v10.registrations.active().await.unwrap().unwrap();
        assert_eq!(active.generation, "v9");
        assert_eq!(active.state, WorkerState::Activated);
        let pending = v10.registrations.pending().await.unwrap().unwrap();
        assert_eq!(pending.generation, "v10");
        assert_eq!(pending.state, WorkerState::Redundant);

        let (response, source) = fetch_through(&v10, page("index.html")).await.unwrap();
        assert_eq!(source, "cache");
        assert_eq!(response.body, b"<html>v9</html>".to_vec());
        assert_eq!(storage.keys().await.unwrap(), vec!["v9"]);
    }

    #[tokio::test]
    async fn install_without_activate_leaves_active_worker() {
        let ctx = UiContext::non_interactive();
        let state = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());

        let v9 = host("v9", storage.clone(), site("v9"), &state);
        install_worker(&ctx, &v9, true).await.unwrap();

        let v10 = host("v10", storage.clone(), site("v10"), &state);
        install_worker(&ctx, &v10, false).await.unwrap();

        let pending = v10.registrations.pending().await.unwrap().unwrap();
        assert_eq!(pending.generation, "v10");
        assert_eq!(pending.state, WorkerState::Installed);

        let (response, _) = fetch_through(&v10, page("app.js")).await.unwrap();
        assert_eq!(response.body, b"// v9".to_vec());

        let mut caches = storage.keys().await.unwrap();
        caches.sort();
        assert_eq!(caches, vec!["v10", "v9"]);
    }
}
