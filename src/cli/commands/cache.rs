//! Cache command - inspect or clear cache generations

use crate::audit::AuditLog;
use crate::cache::{create_storage, format_bytes, CacheStorage, CachedEntry};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{PrecacheError, PrecacheResult};
use crate::ui::{self, UiContext};
use crate::worker::RegistrationStore;
use console::style;
use serde::Serialize;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> PrecacheResult<()> {
    let storage = create_storage(&config.storage)?;
    let current = config.worker.generation.as_str();

    match args.action {
        CacheAction::List { format } => list_caches(&*storage, current, format).await,
        CacheAction::Show { name } => {
            show_cache(&*storage, name.as_deref().unwrap_or(current)).await
        }
        CacheAction::Clear { yes } => clear_caches(&*storage, config, yes).await,
    }
}

/// One cache generation with its totals
#[derive(Debug, Serialize)]
struct CacheSummary {
    name: String,
    entries: usize,
    bytes: u64,
    current: bool,
}

async fn summarize(
    storage: &dyn CacheStorage,
    current: &str,
) -> PrecacheResult<Vec<CacheSummary>> {
    let mut summaries = Vec::new();
    for name in storage.keys().await? {
        let entries = storage.open(&name).await?.entries().await?;
        summaries.push(CacheSummary {
            current: name == current,
            entries: entries.len(),
            bytes: entries.iter().map(CachedEntry::size_bytes).sum(),
            name,
        });
    }
    Ok(summaries)
}

async fn list_caches(
    storage: &dyn CacheStorage,
    current: &str,
    format: OutputFormat,
) -> PrecacheResult<()> {
    let caches = summarize(storage, current).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&caches)?),
        OutputFormat::Plain => {
            for cache in &caches {
                println!("{}", cache.name);
            }
        }
        OutputFormat::Table if caches.is_empty() => println!("No caches found."),
        OutputFormat::Table => print_cache_table(&caches),
    }

    Ok(())
}

fn print_cache_table(caches: &[CacheSummary]) {
    println!("{:<2} {:<40} {:>8} {:>10}", "", "NAME", "ENTRIES", "SIZE");
    println!("{}", "-".repeat(63));

    for cache in caches {
        let marker = if cache.current {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{:<2} {:<40} {:>8} {:>10}",
            marker,
            cache.name,
            cache.entries,
            format_bytes(cache.bytes)
        );
    }

    println!();
    println!("Total: {} cache(s)", caches.len());
}

async fn show_cache(storage: &dyn CacheStorage, name: &str) -> PrecacheResult<()> {
    if !storage.has(name).await? {
        return Err(PrecacheError::User(format!("Cache not found: {}", name)));
    }

    let mut entries = storage.open(name).await?.entries().await?;
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    println!("{}", style(name).bold());
    if entries.is_empty() {
        println!("  (empty)");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "  {:<4} {:>10}  {}  {}",
            entry.response.status,
            format_bytes(entry.size_bytes()),
            entry.stored_at.format("%Y-%m-%d %H:%M"),
            entry.key
        );
    }
    Ok(())
}

/// Delete every cache; both registrations go with them
async fn clear_caches(
    storage: &dyn CacheStorage,
    config: &Config,
    yes: bool,
) -> PrecacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let names = storage.keys().await?;

    if names.is_empty() {
        println!("No caches to clear.");
        return Ok(());
    }

    println!("This will delete {} cache(s):", names.len());
    for name in &names {
        println!("  {} {}", style("•").red(), name);
    }

    if !ui::confirm(&ctx, "Delete these caches?", false).await? {
        ui::step_warn_hint(&ctx, "Aborted", "Pass --yes to skip the prompt");
        return Ok(());
    }

    let mut deleted = Vec::with_capacity(names.len());
    for name in names {
        if storage.delete(&name).await? {
            debug!("Deleted cache {}", name);
            deleted.push(name);
        }
    }

    RegistrationStore::new(
        ConfigManager::registration_path(),
        ConfigManager::pending_registration_path(),
    )
    .clear()
    .await?;
    AuditLog::new(config).cache_cleared(&deleted).await;

    ui::step_ok(&ctx, &format!("Cleared {} cache(s)", deleted.len()));
    Ok(())
}
