//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (absent = flat-file only)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Flat-file storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Event feed configuration
    #[serde(default)]
    pub events: EventFeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. When unset, the event feed runs entirely
    /// off the flat-file backend.
    pub url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the flat JSON files (bounties.json, comments.json,
    /// ratings.json, artifacts.json).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn bounties_path(&self) -> PathBuf {
        self.data_dir.join("bounties.json")
    }

    pub fn comments_path(&self) -> PathBuf {
        self.data_dir.join("comments.json")
    }

    pub fn ratings_path(&self) -> PathBuf {
        self.data_dir.join("ratings.json")
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.data_dir.join("artifacts.json")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventFeedConfig {
    /// Default page size when the caller does not supply a limit
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Hard cap on page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for EventFeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_page_size() -> u32 {
    crate::pagination::DEFAULT_PAGE_SIZE
}
fn default_max_page_size() -> u32 {
    crate::pagination::MAX_PAGE_SIZE
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("GUILDBOARD").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, layered under the environment.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("GUILDBOARD").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}
