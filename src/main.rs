use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tarefas_api::auth::JwksVerifier;
use tarefas_api::config::AppConfig;
use tarefas_api::{app, cors_layer, database, AppState};

/// Tarefas API server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Enable debug logging (overrides DEBUG)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, AUTH0_DOMAIN, etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.debug {
        config.server.debug = true;
    }

    init_tracing(config.server.debug);
    tracing::info!("Starting Tarefas API in {:?} mode", config.environment);

    let store = database::connect(&config.database)
        .await
        .context("failed to open task store")?;
    let verifier = JwksVerifier::new(&config.auth).context("failed to build token verifier")?;

    let state = AppState::new(store, Arc::new(verifier));
    let app = app(state, cors_layer(&config.cors));

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Tarefas API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` when the debug flag is set
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
