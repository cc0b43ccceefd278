//! Route definitions for the chat relay.
//!
//! The WebSocket endpoint lives at `/` (where browser clients connect by
//! default) and at `/ws`; health endpoints are mounted under `/api`.

use axum::{Router, routing::get};

use crate::handlers;
use crate::state::AppState;

/// Build the router with all routes, threading `AppState` through every
/// handler via `.with_state(state)`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new().merge(health_routes());

    let ws_routes = Router::new()
        .route("/", get(handlers::ws::ws_upgrade))
        .route("/ws", get(handlers::ws::ws_upgrade));

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .with_state(state)
}

/// Liveness and relay statistics
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}
