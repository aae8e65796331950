//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{PrecacheError, PrecacheResult};
use crate::ui::{self, UiContext};
use crate::worker::WorkerSettings;
use std::path::PathBuf;

/// Keys accepted by `config set`
const KEYS: &[&str] = &[
    "general.log_format",
    "general.audit_log",
    "worker.generation",
    "worker.scope",
    "worker.assets",
    "worker.offline_page",
    "network.timeout_secs",
    "network.max_body_bytes",
    "network.user_agent",
    "storage.backend",
    "storage.dir",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> PrecacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => println!("{}", toml::to_string_pretty(config)?),
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut updated = config.clone();
            set_value(&mut updated, &key, &value)?;
            manager.save(&updated).await?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> PrecacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Apply one dot-separated key, then re-validate the worker section
fn set_value(config: &mut Config, key: &str, value: &str) -> PrecacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => {
            if !matches!(value, "text" | "json") {
                return Err(PrecacheError::User(format!(
                    "Invalid log format '{}'. Use text or json",
                    value
                )));
            }
            config.general.log_format = value.to_string();
        }
        ["general", "audit_log"] => config.general.audit_log = parse_bool(value)?,

        ["worker", "generation"] => config.worker.generation = value.to_string(),
        ["worker", "scope"] => config.worker.scope = value.to_string(),
        ["worker", "assets"] => config.worker.assets = parse_list(value),
        ["worker", "offline_page"] => config.worker.offline_page = value.to_string(),

        ["network", "timeout_secs"] => config.network.timeout_secs = parse_u64(value)?,
        ["network", "max_body_bytes"] => config.network.max_body_bytes = parse_u64(value)?,
        ["network", "user_agent"] => config.network.user_agent = value.to_string(),

        ["storage", "backend"] => {
            if !matches!(value, "disk" | "memory") {
                return Err(PrecacheError::User(format!(
                    "Invalid storage backend '{}'. Use disk or memory",
                    value
                )));
            }
            config.storage.backend = value.to_string();
        }
        ["storage", "dir"] => config.storage.dir = Some(PathBuf::from(value)),

        _ => {
            return Err(PrecacheError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                KEYS.join(", ")
            )))
        }
    }

    WorkerSettings::from_config(&config.worker)?;
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> PrecacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PrecacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> PrecacheResult<u64> {
    value
        .parse()
        .map_err(|_| PrecacheError::User(format!("Invalid number: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_worker_keys() {
        let mut config = Config::default();
        set_value(&mut config, "worker.generation", "simple-hours-v10").unwrap();
        set_value(&mut config, "worker.scope", "https://user.github.io/simple-hours").unwrap();
        set_value(&mut config, "worker.assets", "index.html, app.js,,style.css").unwrap();

        assert_eq!(config.worker.generation, "simple-hours-v10");
        assert_eq!(config.worker.assets, vec!["index.html", "app.js", "style.css"]);
    }

    #[test]
    fn set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(set_value(&mut config, "general.audit_log", "maybe").is_err());
        assert!(set_value(&mut config, "network.timeout_secs", "-1").is_err());
        assert!(set_value(&mut config, "storage.backend", "s3").is_err());
        assert!(set_value(&mut config, "general.log_format", "xml").is_err());

        let err = set_value(&mut config, "worker.color", "blue").unwrap_err();
        assert!(err.to_string().contains("worker.generation"));
    }

    #[test]
    fn set_validates_worker_section() {
        let mut config = Config::default();
        let err = set_value(&mut config, "worker.offline_page", "https://other.example/").unwrap_err();
        assert!(matches!(err, PrecacheError::InvalidAsset { .. }));
    }

    #[test]
    fn set_numeric_and_bool() {
        let mut config = Config::default();
        set_value(&mut config, "network.timeout_secs", "5").unwrap();
        set_value(&mut config, "general.audit_log", "no").unwrap();
        assert_eq!(config.network.timeout_secs, 5);
        assert!(!config.general.audit_log);
    }

    #[tokio::test]
    async fn init_respects_force() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));

        init_config(&manager, false).await.unwrap();
        let mut config = Config::default();
        config.worker.generation = "custom".to_string();
        manager.save(&config).await.unwrap();

        init_config(&manager, false).await.unwrap();
        assert_eq!(manager.load().await.unwrap().worker.generation, "custom");

        init_config(&manager, true).await.unwrap();
        assert_eq!(manager.load().await.unwrap().worker.generation, "precache-v1");
    }
}
