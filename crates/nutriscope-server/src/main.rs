//! Nutriscope Server - REST API for model monitoring
//!
//! Serves retraining jobs, model metadata and request telemetry to the
//! dashboard.
//!
//! # Usage
//!
//! ```bash
//! # Start the server
//! nutriscope-server
//!
//! # With custom host and port
//! nutriscope-server --host 127.0.0.1 --port 8000
//! ```

use clap::Parser;
use nutriscope_server::{create_router, AppState, Config};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 5000;

/// Nutriscope Server - REST API for model monitoring
#[derive(Parser, Debug)]
#[command(name = "nutriscope-server")]
#[command(about = "Nutriscope model monitoring API server")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutriscope_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Nutriscope Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if let Some(config_path) = args.config {
        Config::load_from_path(&std::path::PathBuf::from(config_path))?
    } else {
        Config::load()?
    };

    config.validate()?;
    for warning in config.validate_warnings() {
        tracing::warn!("{}", warning);
    }

    info!(
        tick_interval_ms = config.training.tick_interval_ms,
        progress_step = config.training.progress_step,
        window_secs = config.metrics.window_secs,
        model_version = %config.model.version,
        "Configuration loaded"
    );

    // CLI values win when they differ from their defaults
    let host = if args.host != "0.0.0.0" {
        args.host
    } else {
        config.server.host.clone()
    };
    let port = if args.port != DEFAULT_PORT {
        args.port
    } else {
        config.server.port
    };
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Create application state and router
    let state = AppState::new(config)?;
    let app = create_router(state.clone());

    info!("Nutriscope Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!("Nutriscope Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
