//! Status command - registration and cache overview

use crate::cache::{create_storage, format_bytes, CachedEntry};
use crate::config::{Config, ConfigManager};
use crate::error::PrecacheResult;
use crate::ui::{self, UiContext};
use crate::worker::{Registration, RegistrationStore, WorkerState};
use chrono::{DateTime, Utc};
use console::style;

/// Execute the status command
pub async fn execute(config: &Config, config_path: &std::path::Path) -> PrecacheResult<()> {
    let ctx = UiContext::detect();
    println!("{}", style("precache status").bold().cyan());

    ui::section("Configuration");
    ui::key_value("Config", &config_path.display().to_string());
    ui::key_value("State dir", &ConfigManager::state_dir().display().to_string());
    ui::key_value("Generation", &config.worker.generation);
    ui::key_value("Scope", &config.worker.scope);
    ui::key_value("Assets", &config.worker.assets.len().to_string());

    let registrations = RegistrationStore::new(
        ConfigManager::registration_path(),
        ConfigManager::pending_registration_path(),
    );
    let active = registrations.active().await?;
    let pending = registrations.pending().await?;

    ui::section("Worker");
    match &active {
        None if pending.is_none() => {
            ui::step_warn_hint(&ctx, "No worker registered", "Run: precache install --activate")
        }
        None => ui::remark(&ctx, "No active worker"),
        Some(reg) => print_registration(reg),
    }
    if let Some(reg) = &pending {
        ui::section("Pending worker");
        print_registration(reg);
    }

    let serving = active.as_ref().map(|reg| reg.generation.as_str());
    if serving.is_some_and(|generation| generation != config.worker.generation) {
        ui::step_warn_hint(
            &ctx,
            &format!("Configured generation is {}", config.worker.generation),
            "Run: precache install --activate",
        );
    }

    ui::section("Caches");
    let storage = create_storage(&config.storage)?;
    ui::key_value("Backend", storage.backend_name());
    let names = storage.keys().await?;
    if names.is_empty() {
        ui::remark(&ctx, "No caches");
    }
    for name in names {
        let entries = storage.open(&name).await?.entries().await?;
        let bytes: u64 = entries.iter().map(CachedEntry::size_bytes).sum();
        ui::key_value_status(
            &name,
            &format!("{} entries, {}", entries.len(), format_bytes(bytes)),
            name == config.worker.generation,
        );
    }

    Ok(())
}

fn print_registration(reg: &Registration) {
    ui::key_value("Registration", &reg.id.to_string());
    ui::key_value("Generation", &reg.generation);
    ui::key_value_status(
        "State",
        &reg.state.to_string(),
        reg.state == WorkerState::Activated,
    );
    ui::key_value("Installed", &timestamp(reg.installed_at));
    ui::key_value("Activated", &timestamp(reg.activated_at));
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
