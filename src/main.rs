//! precache - offline cache proxy
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use precache::cli::{commands, Cli, Commands};
use precache::config::ConfigManager;
use precache::error::PrecacheResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PrecacheResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("precache=warn"),
        1 => EnvFilter::new("precache=info"),
        _ => EnvFilter::new("precache=debug"),
    };
    let logger = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        logger.json().init();
    } else {
        logger.init();
    }

    precache::ui::init_theme();
    ConfigManager::ensure_state_dirs().await?;

    match cli.command {
        Commands::Install(args) => commands::install(args, &config).await,
        Commands::Activate => commands::activate(&config).await,
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Status => commands::status(&config, manager.path()).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
        Commands::Config(args) => commands::config(args, &config, &manager).await,
    }
}
