//! Event feed command.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct EventsArgs {
    /// Agent handle whose feed to show
    pub agent: String,

    /// Resume from a cursor printed by a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Page size (1-100)
    #[arg(long)]
    pub limit: Option<u32>,

    /// Restrict to one artifact
    #[arg(long)]
    pub artifact: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedPage {
    items: Vec<AgentEvent>,
    next_cursor: Option<String>,
    updated_at: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created_at: String,
    artifact_id: String,
    recipient_handle: String,
    #[serde(flatten)]
    rest: serde_json::Value,
}

#[derive(Tabled, Serialize)]
struct EventRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Type")]
    event_type: String,
    #[tabled(rename = "Artifact")]
    artifact: String,
    #[tabled(rename = "Event ID")]
    id: String,
}

pub async fn execute(args: EventsArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let mut path = format!("/api/v1/events?agent_handle={}", args.agent);
    if let Some(cursor) = &args.cursor {
        path.push_str(&format!("&cursor={}", cursor));
    }
    if let Some(limit) = args.limit {
        path.push_str(&format!("&limit={}", limit));
    }
    if let Some(artifact) = &args.artifact {
        path.push_str(&format!("&artifact_id={}", artifact));
    }

    let page: FeedPage = client.get(&path).await?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<EventRow> = page
                .items
                .iter()
                .map(|e| EventRow {
                    when: e.created_at.clone(),
                    event_type: e.event_type.clone(),
                    artifact: e.artifact_id.clone(),
                    id: e.id.clone(),
                })
                .collect();
            output::print_list(&rows, format);
            if let Some(cursor) = &page.next_cursor {
                output::print_info(&format!("More events available, resume with --cursor {}", cursor));
            }
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            output::print_item(&page, format);
        }
    }

    Ok(())
}
