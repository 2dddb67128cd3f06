use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use vanish_lifecycle::{LifecycleManager, Reaper};
use vanish_server::api::AppState;
use vanish_server::config::VanishConfig;
use vanish_server::store_factory::{create_blob_store, create_metadata_store};

/// Vanish expiring-object HTTP server.
#[derive(Parser, Debug)]
#[command(name = "vanish-server", about = "Standalone HTTP server for Vanish")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "vanish.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run database migrations for the configured metadata backend, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from TOML file, or use defaults if the file does not exist.
    let config_exists = Path::new(&cli.config).exists();
    let config: VanishConfig = if config_exists {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        toml::from_str("")?
    };

    vanish_server::telemetry::init(&config.telemetry);

    if !config_exists {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    if let Some(Commands::Migrate) = cli.command {
        return run_migrate(&config).await;
    }

    let blob = create_blob_store(&config.blob).await?;
    let metadata = create_metadata_store(&config.metadata).await?;

    let manager = LifecycleManager::builder()
        .blob_store(blob)
        .metadata_store(metadata)
        .config(config.lifecycle.to_lifecycle_config())
        .build()?;
    manager.ensure_namespace().await?;
    let manager = Arc::new(manager);

    let reaper = Arc::new(Reaper::new(
        Arc::clone(&manager),
        config.reaper.to_reaper_config(),
    )?);
    let reaper_handle = Arc::clone(&reaper).spawn();

    let state = AppState {
        manager,
        reaper,
        max_upload_bytes: config.server.max_upload_bytes,
    };
    let app = vanish_server::api::router(state);

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "vanish-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let a running pass finish, within bounds.
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    if tokio::time::timeout(shutdown_timeout, reaper_handle.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "reaper did not stop in time; expired objects will be reclaimed on next start"
        );
    }

    info!("vanish-server stopped");
    Ok(())
}

/// Run the `migrate` subcommand: building a SQL store runs its migrations.
async fn run_migrate(config: &VanishConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(backend = %config.metadata.backend, "running metadata backend migrations...");
    let _store = create_metadata_store(&config.metadata).await?;
    info!(backend = %config.metadata.backend, "metadata backend migrations complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
