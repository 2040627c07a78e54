//! coedit server entry point.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use coedit_core::registry::spawn_reaper;
use coedit_core::{ConfigManager, GenaiEngineFactory};
use coedit_server::{build_router, AppState};

#[derive(Parser)]
#[command(name = "coedit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve conversational code-editing sessions over HTTP", long_about = None)]
struct Cli {
    /// Configuration file (defaults to <config dir>/coedit/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overriding the config file
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose raises our crates to debug
    let default_filter = if cli.verbose {
        "info,coedit_core=debug,coedit_server=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    }
    .context("Failed to load configuration")?;
    tracing::info!(path = %manager.path().display(), "Configuration loaded");
    let config = manager.into_config();

    let engines = Arc::new(GenaiEngineFactory::new(config.engine.clone()));
    let state = AppState::new(config.session.clone(), engines, config.server.push_buffer);

    if spawn_reaper(state.registry.clone()).is_some() {
        tracing::info!(
            idle_timeout_secs = config.session.idle_timeout_secs,
            "Idle session reaper started"
        );
    }

    let mut app = build_router(state).layer(TraceLayer::new_for_http());
    if config.server.cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

    tracing::info!("coedit v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                futures::future::pending::<()>().await;
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
