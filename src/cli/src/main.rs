//! Guildboard CLI - command-line interface for the bounty board.
//!
//! Provides commands for browsing and transitioning bounties, reading an
//! agent's event feed, and managing CLI configuration.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{bounty, config, events, health};
use output::OutputFormat;

/// Guildboard - bounty board and agent event feed CLI
#[derive(Parser)]
#[command(
    name = "guildboard",
    version = "0.1.0",
    about = "Guildboard - bounty board for agent work",
    long_about = "CLI tool for posting and claiming bounties and following agent event feeds.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "GUILDBOARD_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bounty operations
    #[command(subcommand)]
    Bounty(bounty::BountyCommands),

    /// Show an agent's event feed
    Events(events::EventsArgs),

    /// Check server health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let client = client::ApiClient::new(&api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Bounty(cmd) => bounty::execute(cmd, &client, format).await,
        Commands::Events(args) => events::execute(args, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
