//! canonry-cs (Curation Service)
//!
//! Serves the curation core over HTTP: works, lineage edges, lineage
//! graphs, tier promotions and a live SSE event stream.

use anyhow::{Context, Result};
use canonry_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use canonry_common::db::init_database;
use canonry_common::events::EventBus;
use canonry_common::store::SqliteWorkStore;
use canonry_cs::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "canonry-cs")]
#[command(about = "Curation Service for Canonry")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "CANONRY_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(short, long, env = "CANONRY_BIND_ADDRESS")]
    bind: Option<String>,

    /// Data root folder holding canonry.db (beats CANONRY_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (defaults to CANONRY_CONFIG, then platform locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "canonry_cs=info,canonry_common=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database work
    info!(
        "Starting Canonry Curation Service (canonry-cs) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref());
    let defaults = CompiledDefaults::for_current_platform();

    let root_folder = RootFolderResolver::new()
        .with_toml_config(&config)
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    info!("Root folder: {}", root_folder.display());

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e).context("Database initialization failed");
        }
    };

    let store = Arc::new(SqliteWorkStore::new(pool));
    let event_bus = EventBus::new(config.event_capacity);
    info!(
        "Event bus initialized (capacity {}); lineage depth default {} max {}",
        config.event_capacity, config.lineage.default_depth, config.lineage.max_depth
    );

    let state = AppState::new(store, event_bus, config.lineage);
    let app = build_router(state);

    let bind = args
        .bind
        .or(config.bind_address)
        .unwrap_or(defaults.bind_address);
    let port = args.port.or(config.port).unwrap_or(defaults.port);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("canonry-cs listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
