use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    app_state::AppState,
    bootstrap::{bootstrap, list_data_files},
    config::{LoggingConfig, SyncConfig},
    config_loader::load_config,
    errors::SyncError,
    syncweb::build_sync_router,
};

/// Top-level CLI interface for the sync server
#[derive(Parser, Debug)]
#[command(
    name = "harmony_sync",
    version,
    about = "Harmony admin data sync server"
)]
pub struct Cli {
    /// Path to a TOML config file (defaults to ./harmony_sync.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Host/IP to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create the storage root and empty data files
    Bootstrap,

    /// Print the access record of a user
    Lookup { username: String },

    /// Report whether a user has an affirmative consent entry
    HasConsented { user_id: String },

    /// List the files in the storage root
    ListFiles,
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match logging.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        "compact" => registry
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref()).context("failed to load config")?;

    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.host = host.clone();
        }
        if let Some(port) = port {
            config.port = *port;
        }
        config.validate()?;
    }

    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { .. } => serve(config).await,
        Commands::Bootstrap => {
            bootstrap(&config.paths())?;
            println!("storage ready at {}", config.storage_root.display());
            Ok(())
        }
        Commands::Lookup { username } => {
            let state = AppState::from_config(&config);
            match state.records.lookup(&username) {
                Ok(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(())
                }
                Err(e @ SyncError::NotFound { .. }) | Err(e @ SyncError::StorageUnavailable { .. }) => {
                    println!("{e}");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::HasConsented { user_id } => {
            let state = AppState::from_config(&config);
            println!("{}", state.consent.has_consented(&user_id));
            Ok(())
        }
        Commands::ListFiles => {
            for name in list_data_files(&config.storage_root)? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn serve(config: SyncConfig) -> anyhow::Result<()> {
    let paths = config.paths();
    bootstrap(&paths)?;

    let state = Arc::new(AppState::from_config(&config));
    tracing::info!(
        storage_root = %paths.root.display(),
        device_id = %state.device,
        "sync state initialised"
    );
    let app = build_sync_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("HTTP server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::parse_from(["harmony_sync", "serve", "--port", "9000"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_global_config_flag() {
        let cli = Cli::parse_from(["harmony_sync", "lookup", "alice", "--config", "alt.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Commands::Lookup { ref username } if username == "alice"));
    }
}
