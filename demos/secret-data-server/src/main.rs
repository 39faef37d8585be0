//! # Secret Data Server
//!
//! WebSocket JSON-RPC 2.0 server exposing an access-controlled secret store
//! with error messages in English, Russian, French and Spanish.
//!
//! ## Usage
//! ```bash
//! cargo run --package secret-data-server -- --config cfg.toml --port 8080
//! ```
//!
//! ## Example request
//! ```json
//! {"jsonrpc":"2.0","method":"manageSecretData","id":1,
//!  "params":{"action":"add","dataID":"k1","userData":"hello","accessLevel":"admin","language":"fr-FR"}}
//! ```

mod config;
mod logging;
mod secret_data;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lingua_ws_server::WsRpcServer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::secret_data::SecretDataManager;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "cfg.toml")]
    config: PathBuf,

    /// Override `server_parameters.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server_parameters.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Override `server_parameters.threads`
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    config
        .server_parameters
        .apply_overrides(args.host, args.port, args.threads);

    logging::init(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server_parameters.worker_threads())
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<()> {
    let params = &config.server_parameters;
    let bind_address = params.bind_address()?;

    info!("Creating server...");
    let server = WsRpcServer::builder()
        .bind_address(bind_address)
        .server_version(params.version.clone())
        .build();

    let manager = Arc::new(SecretDataManager::new());
    manager.register_methods(server.registry());

    let listener = server
        .bind()
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(
        "Server {} with version: {} on {} threads was started",
        listener.local_addr(),
        params.version,
        params.worker_threads()
    );

    listener.serve_with_shutdown(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
}
