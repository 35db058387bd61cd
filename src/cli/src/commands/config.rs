//! CLI configuration stored in the user's config directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the full configuration
    Show,

    /// Get one configuration value
    Get(GetArgs),

    /// Set one configuration value
    Set(SetArgs),
}

#[derive(Args)]
pub struct GetArgs {
    /// Key (api_url)
    pub key: String,
}

#[derive(Args)]
pub struct SetArgs {
    /// Key (api_url)
    pub key: String,
    /// New value
    pub value: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("guildboard").join("config.toml"))
}

fn load_config() -> CliConfig {
    let Some(path) = config_path() else {
        return CliConfig::default();
    };
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| toml::from_str(&content).ok())
        .unwrap_or_default()
}

fn save_config(config: &CliConfig) -> Result<()> {
    let path = config_path().context("No config directory available on this platform")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// The configured API URL, if any. Used as the default for --api-url.
pub fn load_api_url() -> Option<String> {
    load_config().api_url
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = load_config();
            output::print_item(&config, format);
            if let Some(path) = config_path() {
                output::print_detail("file", &path.display().to_string());
            }
        }
        ConfigCommands::Get(args) => match args.key.as_str() {
            "api_url" => {
                let config = load_config();
                println!("{}", config.api_url.unwrap_or_default());
            }
            other => anyhow::bail!("Unknown configuration key: {}", other),
        },
        ConfigCommands::Set(args) => match args.key.as_str() {
            "api_url" => {
                let mut config = load_config();
                config.api_url = Some(args.value.clone());
                save_config(&config)?;
                output::print_success(&format!("api_url = {}", args.value));
            }
            other => anyhow::bail!("Unknown configuration key: {}", other),
        },
    }
    Ok(())
}
