use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinicore::ai::{HttpTextGenerator, TextGenerator};
use clinicore::config::Config;
use clinicore::permissions::PermissionRegistry;
use clinicore::presence::PresenceRegistry;
use clinicore::AppState;

#[derive(Parser, Debug)]
#[command(name = "clinicore")]
#[command(author, version, about = "A fast, lightweight clinic management server", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "clinicore.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Clinicore v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)?;

    // Initialize database
    let db = clinicore::db::init(&config.server.data_dir).await?;

    // Ensure the bootstrap admin user exists
    clinicore::api::auth::ensure_admin_user(
        &db,
        &config.auth.admin_email,
        &config.auth.admin_password,
    )
    .await?;

    // Load the permission registry (defaults + persisted overrides)
    let permissions = PermissionRegistry::load(&db).await?;

    // Presence registry with background lease sweeper
    let presence = Arc::new(PresenceRegistry::new(Duration::from_secs(
        config.presence.lease_ttl_secs,
    )));
    presence.spawn_sweeper(Duration::from_secs(config.presence.sweep_interval_secs));

    // Metrics recorder
    let metrics_handle = clinicore::api::metrics::init_metrics();

    // Text-generation backend for the AI helpers, when configured
    let text_generator: Option<Arc<dyn TextGenerator>> = if config.ai.enabled {
        Some(Arc::new(HttpTextGenerator::from_config(&config.ai)?))
    } else {
        None
    };

    // Create app state
    let mut state = AppState::new(config.clone(), db, permissions, presence)
        .with_metrics(metrics_handle);
    if let Some(generator) = text_generator {
        state = state.with_text_generator(generator);
    }
    let state = Arc::new(state);

    // Create API router
    let app = clinicore::api::create_router(state);

    // Start API server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);
    tracing::info!("Admin token: {}", config.auth.admin_token);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
