//! Application state shared across all handlers.

use std::sync::Arc;

use chatrelay_core::config::AppConfig;
use chatrelay_realtime::server::RealtimeEngine;

/// State handed to every handler through Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// Connection registry and fan-out.
    pub realtime: Arc<RealtimeEngine>,
    /// Process start, for uptime reporting.
    pub started_at: std::time::Instant,
}

impl AppState {
    /// Builds the state and its realtime engine from configuration.
    pub fn new(config: AppConfig) -> Self {
        let realtime = Arc::new(RealtimeEngine::new(config.realtime.clone()));
        Self {
            config: Arc::new(config),
            realtime,
            started_at: std::time::Instant::now(),
        }
    }
}
