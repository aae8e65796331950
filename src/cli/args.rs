//! CLI argument definitions using clap derive

use crate::http::Method;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// precache - offline cache proxy
///
/// Precaches a web app's assets into a named cache generation and answers
/// requests cache-first, falling back to the network and an offline page.
#[derive(Parser, Debug)]
#[command(name = "precache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PRECACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Precache every configured asset into the current generation
    Install(InstallArgs),

    /// Delete stale generations and start serving from the cache
    Activate,

    /// Run one request through the worker
    Fetch(FetchArgs),

    /// Show registration and cache status
    Status,

    /// Inspect or clear caches
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Activate immediately after a successful install
    #[arg(short, long)]
    pub activate: bool,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL to request
    pub url: String,

    /// Send as a page navigation (enables the offline page fallback)
    #[arg(short, long)]
    pub navigate: bool,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: Method,

    /// Request header (Name: value)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Write the response body to a file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., worker.generation)
        key: String,
        /// Value to set; lists are comma-separated
        value: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List every cache generation
    List {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List the entries of one cache
    Show {
        /// Cache name (defaults to the configured generation)
        name: Option<String>,
    },

    /// Delete every cache
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Parse a header in `Name: value` form
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid header '{s}': expected 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header '{s}': empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
