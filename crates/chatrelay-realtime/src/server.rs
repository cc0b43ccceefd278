//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use chatrelay_core::config::RealtimeConfig;

use crate::connection::registry::ConnectionRegistry;
use crate::fanout::Broadcaster;
use crate::metrics::RealtimeMetrics;

/// Central real-time engine that coordinates the registry and fan-out.
pub struct RealtimeEngine {
    /// Connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Broadcast fan-out.
    pub broadcaster: Arc<Broadcaster>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    /// Engine settings.
    pub config: RealtimeConfig,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.registry.len())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine with all subsystems.
    pub fn new(config: RealtimeConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        let metrics = Arc::new(RealtimeMetrics::new());
        let registry = Arc::new(ConnectionRegistry::new(
            config.outbound_buffer_size,
            metrics.clone(),
        ));
        let broadcaster = Arc::new(Broadcaster::new(registry.clone(), metrics.clone()));

        info!(
            outbound_buffer_size = config.outbound_buffer_size,
            "Real-time engine initialized"
        );

        Self {
            registry,
            broadcaster,
            metrics,
            config,
            shutdown_tx,
        }
    }

    /// Returns a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Initiates a graceful shutdown: signals every session and moves all
    /// connections to `Closing` so they flush and deregister.
    pub fn shutdown(&self) {
        info!("Shutting down real-time engine");

        self.shutdown_tx.send_replace(true);
        self.registry.close_all();
    }
}
