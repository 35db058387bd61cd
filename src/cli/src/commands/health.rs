//! Server health command.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {}

#[derive(Debug, Deserialize, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    timestamp: String,
}

pub async fn execute(_args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            if health.status == "healthy" {
                output::print_success(&format!("Server at {} is healthy", client.base_url()));
            } else {
                output::print_error(&format!(
                    "Server at {} reports status: {}",
                    client.base_url(),
                    health.status
                ));
            }
            output::print_detail("version", &health.version);
            output::print_detail("timestamp", &health.timestamp);
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            output::print_item(&health, format);
        }
    }

    Ok(())
}
