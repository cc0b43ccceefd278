//! Realtime engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::fanout::BroadcastReport;

/// Engine-level metrics counters.
#[derive(Debug)]
pub struct RealtimeMetrics {
    /// Total connections established
    connections_total: AtomicU64,
    /// Connections currently registered
    connections_active: AtomicU64,
    /// Inbound frames handled
    frames_received: AtomicU64,
    /// Inbound frames that needed the fallback decode
    decode_fallbacks: AtomicU64,
    /// Frames enqueued to recipients
    frames_delivered: AtomicU64,
    /// Frames discarded because a recipient queue was full
    frames_dropped: AtomicU64,
    /// Recipients skipped because they were no longer active
    recipients_skipped: AtomicU64,
}

impl RealtimeMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            decode_fallbacks: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            recipients_skipped: AtomicU64::new(0),
        }
    }

    /// Record a new connection
    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a disconnection
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an inbound frame
    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame that fell back to the raw-text substitute
    pub fn decode_fallback(&self) {
        self.decode_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one broadcast's per-recipient outcomes into the totals
    pub fn record_broadcast(&self, report: &BroadcastReport) {
        self.frames_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.frames_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
        self.recipients_skipped
            .fetch_add(report.skipped as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_fallbacks: self.decode_fallbacks.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            recipients_skipped: self.recipients_skipped.load(Ordering::Relaxed),
        }
    }
}

impl Default for RealtimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections ever established
    pub connections_total: u64,
    /// Currently registered connections
    pub connections_active: u64,
    /// Inbound frames handled
    pub frames_received: u64,
    /// Inbound frames decoded through the fallback
    pub decode_fallbacks: u64,
    /// Frames enqueued to recipients
    pub frames_delivered: u64,
    /// Frames dropped on full queues
    pub frames_dropped: u64,
    /// Recipients skipped as inactive
    pub recipients_skipped: u64,
}
