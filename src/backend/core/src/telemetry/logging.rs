//! Structured logging with JSON and pretty formats.
//!
//! JSON is the default so log aggregation works out of the box; pretty and
//! compact formats exist for local development. The level comes from
//! configuration but `RUST_LOG` wins when set.

use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty, or compact)
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    #[default]
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Initialize the tracing subscriber.
///
/// Fails if a global subscriber is already installed or the level string
/// does not parse.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer().json().with_current_span(true).with_target(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty().with_target(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_target(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_format_parses_from_config_strings() {
        let format: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(format, LogFormat::Pretty);
        let format: LogFormat = serde_json::from_str("\"compact\"").unwrap();
        assert_eq!(format, LogFormat::Compact);
    }
}
