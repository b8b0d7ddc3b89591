//! hireflow-server: applicant tracking HTTP service
//!
//! Configuration resolves CLI → environment → TOML → defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hireflow_common::config::{database_path, load_toml_config, resolve_root_folder};
use hireflow_common::db::{init_database, load_or_create_token_secret};
use hireflow_common::logging::init_tracing;
use hireflow_server::services::auth::TokenSettings;
use hireflow_server::services::calendar::CalendarRegistry;
use hireflow_server::services::sla;
use hireflow_server::{build_router, AppState};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "hireflow-server", version, about = "Applicant tracking service")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "HIREFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding the database
    #[arg(long, env = "HIREFLOW_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// HTTP port (overrides the config file)
    #[arg(long, env = "HIREFLOW_PORT")]
    port: Option<u16>,

    /// Bind address (overrides the config file)
    #[arg(long, env = "HIREFLOW_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&loaded.config.logging).context("Failed to initialize logging")?;

    info!("Starting hireflow-server v{}", env!("CARGO_PKG_VERSION"));
    loaded.log_source();
    let config = loaded.config;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await.context("Failed to open database")?;
    info!("✓ Database ready");

    let secret = load_or_create_token_secret(&pool, config.auth.token_secret.as_deref()).await?;
    let tokens = TokenSettings::new(secret, config.auth.token_ttl_hours);
    let calendar = CalendarRegistry::from_config(&config.calendar);

    let state = AppState::new(pool, tokens, calendar);

    let sweeper = sla::spawn_sweeper(state.clone(), config.sla.sweep_interval_secs);

    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_addr);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("hireflow-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("hireflow-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
