mod config;
mod routes;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Overrides, ServerConfig};

#[derive(Parser)]
#[command(name = "assetview-server", about = "Serves the asset viewer front-end")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Port to listen on [env: PORT, default: 5000]
    #[arg(long)]
    port: Option<u16>,

    /// Deployment mode; only "production" serves files [env: NODE_ENV, default: development]
    #[arg(long)]
    mode: Option<String>,

    /// Directory holding the built front-end [env: STATIC_DIR, default: client/build]
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Dotenv file consulted after the process environment
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let file = config::read_env_file(&cli.env_file)?;
    if !file.is_empty() {
        tracing::debug!(path = %cli.env_file.display(), vars = file.len(), "loaded env file");
    }
    let overrides = Overrides {
        port: cli.port,
        mode: cli.mode,
        static_dir: cli.static_dir,
    };
    let config = ServerConfig::resolve(overrides, config::layered(file))?;

    if config.is_production() {
        tracing::info!(dir = %config.static_dir.display(), "serving static front-end");
    } else {
        tracing::info!(mode = %config.mode, "not in production mode; static files disabled");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(config))
}

async fn serve(config: ServerConfig) -> Result<()> {
    let app = routes::router(&config);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("Server started on port {}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
