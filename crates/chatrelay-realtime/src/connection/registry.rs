//! Connection registry, the authoritative set of live connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::Frame;
use crate::metrics::RealtimeMetrics;

use super::handle::{ConnectionHandle, ConnectionId};

/// Thread-safe registry of all `Active` and `Closing` connections.
///
/// Every mutation is atomic per entry (one shard lock), so a snapshot taken
/// concurrently with a registration or a removal sees that connection
/// either fully present or fully absent, never half-registered.
#[derive(Debug)]
pub struct ConnectionRegistry {
    /// Connection ID → handle.
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// Next registration sequence number.
    next_seq: AtomicU64,
    /// Capacity of each outbound queue.
    outbound_capacity: usize,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
}

impl ConnectionRegistry {
    /// Creates an empty registry whose connections get outbound queues of
    /// `outbound_capacity` frames.
    pub fn new(outbound_capacity: usize, metrics: Arc<RealtimeMetrics>) -> Self {
        Self {
            connections: DashMap::new(),
            next_seq: AtomicU64::new(0),
            outbound_capacity: outbound_capacity.max(1),
            metrics,
        }
    }

    /// Registers a new `Active` connection.
    ///
    /// Returns the connection handle and the receiving half of its outbound
    /// queue, which the caller must drain.
    pub fn register(&self) -> (Arc<ConnectionHandle>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(ConnectionHandle::new(seq, tx));

        self.connections.insert(handle.id, handle.clone());
        self.metrics.connection_opened();

        info!(conn_id = %handle.id, "Client connected");

        (handle, rx)
    }

    /// Gets a connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .get(conn_id)
            .map(|entry| entry.value().clone())
    }

    /// Updates a connection's display name.
    ///
    /// Returns false, without error, when the connection is already gone;
    /// a rename racing a disconnect is expected.
    pub async fn set_display_name(&self, conn_id: &ConnectionId, name: &str) -> bool {
        let Some(handle) = self.get(conn_id) else {
            debug!(conn_id = %conn_id, "Display name update for unknown connection");
            return false;
        };
        handle.set_display_name(name).await;
        true
    }

    /// Moves a connection from `Active` to `Closing`.
    ///
    /// The connection stays registered until [`deregister`](Self::deregister)
    /// but no longer receives frames.
    pub fn begin_close(&self, conn_id: &ConnectionId) -> bool {
        match self.get(conn_id) {
            Some(handle) => handle.begin_close(),
            None => false,
        }
    }

    /// Closes and removes a connection.
    ///
    /// Safe to call any number of times; only the first call returns the
    /// handle.
    pub fn deregister(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        // Closed under the shard write lock: no snapshot can observe a
        // registered connection in the `Closed` state.
        let (_, handle) = self.connections.remove_if(conn_id, |_, handle| {
            handle.mark_closed();
            true
        })?;

        self.metrics.connection_closed();
        let connected_secs = (Utc::now() - handle.connected_at).num_seconds();
        info!(conn_id = %conn_id, connected_secs, "Client disconnected");

        Some(handle)
    }

    /// Returns the registered connections in registration order.
    ///
    /// Consistent per entry, not across the whole map: shards are read one
    /// at a time, so a connection removed while the walk is underway may
    /// still appear next to one registered after it. Such a handle is
    /// already `Closed` and every delivery to it is skipped.
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        let mut all: Vec<Arc<ConnectionHandle>> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|handle| handle.seq);
        all
    }

    /// Moves every registered connection to `Closing`. Each session then
    /// flushes and deregisters its own connection.
    pub fn close_all(&self) -> usize {
        let closing = self
            .snapshot()
            .iter()
            .filter(|handle| handle.begin_close())
            .count();
        info!(count = closing, "All connections closing");
        closing
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true when no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
