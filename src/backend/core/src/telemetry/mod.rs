//! Telemetry: structured logging and Prometheus metrics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, render_metrics, RequestTimer};

use crate::config::ObservabilityConfig;

/// Initialize logging and metrics from the observability configuration.
pub fn init_telemetry(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let logging = LoggingConfig {
        level: config.log_level.clone(),
        format: if config.json_logging {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
    };
    init_logging(&logging)?;
    init_metrics()?;
    Ok(())
}
