//! Activate command - retire stale generations

use crate::cli::commands::Host;
use crate::config::Config;
use crate::error::{PrecacheError, PrecacheResult};
use crate::ui::{self, UiContext};
use crate::worker::{OfflineWorker, Registration};

/// Execute the activate command
pub async fn execute(config: &Config) -> PrecacheResult<()> {
    let ctx = UiContext::detect();
    let host = Host::new(config)?;
    let mut registration = host
        .configured_registration()
        .await?
        .ok_or(PrecacheError::NotRegistered)?;
    let worker = host.worker_for(&registration)?;

    ui::intro(&ctx, &format!("Activating {}", registration.generation));
    activate_worker(&ctx, &host, &worker, &mut registration).await?;
    ui::outro_success(&ctx, &format!("{} is active", registration.generation));

    Ok(())
}

/// Activate, then promote the registration and audit the result
pub(crate) async fn activate_worker(
    ctx: &UiContext,
    host: &Host,
    worker: &OfflineWorker,
    registration: &mut Registration,
) -> PrecacheResult<()> {
    let report = worker.activate().await?;

    registration.record(worker.state().await);
    host.registrations.promote(registration).await?;
    host.audit.activated(&report).await;

    if report.deleted.is_empty() {
        ui::step_info(ctx, "No stale caches");
    }
    for name in &report.deleted {
        ui::step_ok(ctx, &format!("Deleted stale cache {}", name));
    }
    Ok(())
}
