//! Application builder and server runner.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use chatrelay_core::AppResult;
use chatrelay_core::error::AppError;

use crate::middleware::cors::build_cors_layer;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serves the relay on `listener` until `shutdown` resolves.
///
/// When `shutdown` fires the realtime engine is told to close every
/// connection; sessions flush their queues and deregister on their own.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let engine = state.realtime.clone();
    let app = build_app(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received, closing connections...");
            engine.shutdown();
        })
        .await
        .map_err(|e| AppError::transport(format!("Server error: {e}")))
}
