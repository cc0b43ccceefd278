//! Chat relay server
//!
//! Main entry point: loads configuration, initializes logging, binds the
//! listener and serves WebSocket clients until Ctrl+C / SIGTERM.

use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use chatrelay_api::AppState;
use chatrelay_core::config::AppConfig;
use chatrelay_core::AppResult;
use chatrelay_core::error::{AppError, ErrorKind};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and `CHATRELAY__*` environment variables
fn load_configuration() -> AppResult<AppConfig> {
    let env = std::env::var("CHATRELAY_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> AppResult<()> {
    tracing::info!("Starting chat relay v{}", env!("CARGO_PKG_VERSION"));

    let addr = config.listen_addr();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Transport, format!("Failed to bind {addr}"), e)
    })?;

    tracing::info!("WebSocket server running at ws://{}", addr);

    let state = AppState::new(config);
    let registry = state.realtime.registry.clone();

    chatrelay_api::serve(listener, state, shutdown_signal()).await?;

    // Sessions flush and deregister on their own; give them the grace period.
    let drained = tokio::time::timeout(grace, async {
        while !registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            remaining = registry.len(),
            "Shutdown grace period elapsed with connections still open"
        );
    }

    tracing::info!("Chat relay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
