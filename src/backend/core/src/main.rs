//! guildboard-server: HTTP server for the bounty board and event feed.

use std::sync::Arc;

use tracing::{error, info, warn};

use guildboard_core::api::{build_router, AppState};
use guildboard_core::bounties::BountyStore;
use guildboard_core::db::Database;
use guildboard_core::events::{EventFeed, EventSource, FileEventSource, PgEventSource};
use guildboard_core::telemetry;
use guildboard_core::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration, using defaults: {}", e);
            Config::default()
        }
    };

    telemetry::init_telemetry(&config.observability)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.storage.data_dir.display(),
        "Starting guildboard-server"
    );

    let store = Arc::new(BountyStore::new(config.storage.bounties_path()));

    let primary: Option<Arc<dyn EventSource>> = match &config.database.url {
        Some(url) => match Database::connect(&config.database, url).await {
            Ok(db) => Some(Arc::new(PgEventSource::new(db))),
            Err(e) => {
                warn!(error = %e, "Database unavailable, event feed will use flat files");
                None
            }
        },
        None => {
            info!("No database configured, event feed will use flat files");
            None
        }
    };

    let feed = Arc::new(EventFeed::new(
        primary,
        FileEventSource::new(&config.storage),
        config.events.clone(),
    ));

    let app = build_router(AppState { store, feed });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
