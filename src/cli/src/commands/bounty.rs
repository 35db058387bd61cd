//! Bounty commands: list, show, create, and lifecycle transitions.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum BountyCommands {
    /// List bounties, optionally filtered by tag
    List(ListArgs),

    /// Show one bounty in full
    Show(ShowArgs),

    /// Post a new bounty
    Create(CreateArgs),

    /// Claim an open bounty
    Claim(ClaimArgs),

    /// Submit work for a claimed bounty
    Submit(SubmitArgs),

    /// Accept a submission and complete the bounty
    Complete(CompleteArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Only bounties carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Bounty id
    pub id: String,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Bounty title
    #[arg(long)]
    pub title: String,

    /// What the work is
    #[arg(long)]
    pub description: String,

    /// Budget amount
    #[arg(long, default_value_t = 0.0)]
    pub budget: f64,

    /// Currency code
    #[arg(long)]
    pub currency: Option<String>,

    /// Tags (repeatable)
    #[arg(long)]
    pub tag: Vec<String>,

    /// Acceptance criteria (repeatable)
    #[arg(long)]
    pub requirement: Vec<String>,

    /// Requesting agent handle
    #[arg(long)]
    pub requester: Option<String>,
}

#[derive(Args)]
pub struct ClaimArgs {
    /// Bounty id
    pub id: String,

    /// Claiming agent handle
    #[arg(long)]
    pub agent: String,

    /// Optional claim message
    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Bounty id
    pub id: String,

    /// Submitting agent handle
    #[arg(long)]
    pub agent: String,

    /// Submission notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct CompleteArgs {
    /// Bounty id
    pub id: String,

    /// Accepting agent handle (usually the requester)
    #[arg(long)]
    pub agent: String,
}

/// Bounty as returned by the API. Only the fields the CLI renders.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounty {
    pub id: String,
    pub title: String,
    pub status: String,
    pub budget: f64,
    pub currency: String,
    pub submissions: u32,
    pub requester: String,
    pub deadline: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub rest: serde_json::Value,
}

#[derive(Tabled, Serialize)]
struct BountyRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Budget")]
    budget: String,
    #[tabled(rename = "Subs")]
    submissions: u32,
    #[tabled(rename = "Deadline")]
    deadline: String,
}

impl From<&Bounty> for BountyRow {
    fn from(b: &Bounty) -> Self {
        Self {
            id: b.id.clone(),
            title: b.title.clone(),
            status: output::colorize_status(&b.status),
            budget: format!("{:.2} {}", b.budget, b.currency),
            submissions: b.submissions,
            deadline: b.deadline.clone(),
        }
    }
}

pub async fn execute(cmd: BountyCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        BountyCommands::List(args) => {
            let path = match &args.tag {
                Some(tag) => format!("/api/v1/bounties?tag={}", tag),
                None => "/api/v1/bounties".to_string(),
            };
            let bounties: Vec<Bounty> = client.get(&path).await?;
            let rows: Vec<BountyRow> = bounties.iter().map(BountyRow::from).collect();
            output::print_list(&rows, format);
        }
        BountyCommands::Show(args) => {
            let bounty: Bounty = client.get(&format!("/api/v1/bounties/{}", args.id)).await?;
            output::print_item(&bounty, format);
        }
        BountyCommands::Create(args) => {
            let bounty: Bounty = client
                .post(
                    "/api/v1/bounties",
                    &json!({
                        "title": args.title,
                        "description": args.description,
                        "budget": args.budget,
                        "currency": args.currency,
                        "tags": args.tag,
                        "requirements": args.requirement,
                        "requester": args.requester,
                    }),
                )
                .await?;
            output::print_success(&format!("Created bounty {}", bounty.id));
            output::print_item(&bounty, format);
        }
        BountyCommands::Claim(args) => {
            let bounty =
                transition(client, &args.id, "claim", &args.agent, args.message.clone()).await?;
            output::print_success(&format!("Claimed {} for {}", bounty.id, args.agent));
        }
        BountyCommands::Submit(args) => {
            let bounty =
                transition(client, &args.id, "submit", &args.agent, args.notes.clone()).await?;
            output::print_success(&format!(
                "Submitted work on {} (submission #{})",
                bounty.id, bounty.submissions
            ));
        }
        BountyCommands::Complete(args) => {
            let bounty = transition(client, &args.id, "complete", &args.agent, None).await?;
            output::print_success(&format!("Completed {}", bounty.id));
        }
    }
    Ok(())
}

async fn transition(
    client: &ApiClient,
    id: &str,
    action: &str,
    agent: &str,
    notes: Option<String>,
) -> Result<Bounty> {
    client
        .post(
            &format!("/api/v1/bounties/{}/transition", id),
            &json!({
                "action": action,
                "agentHandle": agent,
                "notes": notes,
            }),
        )
        .await
}
