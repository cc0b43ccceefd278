//! Broadcast fan-out: delivers each inbound message to every registered
//! connection, isolating failures per recipient.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use crate::connection::handle::{ConnectionId, DeliveryOutcome};
use crate::connection::registry::ConnectionRegistry;
use crate::message::Frame;
use crate::message::codec::{decode_inbound, encode_outbound};
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::metrics::RealtimeMetrics;

/// Per-recipient outcome counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections in the snapshot.
    pub recipients: usize,
    /// Frames enqueued.
    pub delivered: usize,
    /// Frames discarded on full queues.
    pub dropped: usize,
    /// Recipients that were no longer active.
    pub skipped: usize,
}

/// Fans inbound chat frames out to all registered connections.
#[derive(Debug)]
pub struct Broadcaster {
    /// Connection registry.
    registry: Arc<ConnectionRegistry>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
}

impl Broadcaster {
    /// Creates a broadcaster over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<RealtimeMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Processes one raw frame received from `source`.
    ///
    /// Undecodable frames are relayed as chat from `"unknown"` carrying the
    /// raw payload. The timestamp is always the server's receipt time. A
    /// join also renames the source connection. The result goes to every
    /// registered connection, the source included.
    pub async fn handle_inbound(&self, source: &ConnectionId, raw: &[u8]) -> BroadcastReport {
        let received_at = Utc::now().timestamp_millis();
        self.metrics.frame_received();

        let inbound = match decode_inbound(raw) {
            Ok(message) => message,
            Err(e) => {
                debug!(conn_id = %source, error = %e, "Relaying undecodable frame as text");
                self.metrics.decode_fallback();
                InboundMessage::fallback(raw)
            }
        };

        debug!(
            conn_id = %source,
            kind = ?inbound.kind(),
            user = %inbound.user(),
            "Inbound message"
        );

        if let InboundMessage::Join { user } = &inbound {
            self.registry.set_display_name(source, user).await;
        }

        self.broadcast(&inbound.stamp(received_at))
    }

    /// Encodes `message` once and offers it to every registered connection.
    pub fn broadcast(&self, message: &OutboundMessage) -> BroadcastReport {
        match encode_outbound(message) {
            Ok(frame) => {
                let report = self.deliver(frame);
                debug!(
                    kind = ?message.kind(),
                    ts = message.ts(),
                    recipients = report.recipients,
                    delivered = report.delivered,
                    "Broadcast complete"
                );
                report
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize broadcast message");
                BroadcastReport::default()
            }
        }
    }

    /// Offers an encoded frame to every connection in a fresh snapshot.
    ///
    /// Never blocks: a full queue drops the frame for that recipient only,
    /// and inactive recipients are skipped.
    pub fn deliver(&self, frame: Frame) -> BroadcastReport {
        let recipients = self.registry.snapshot();
        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..BroadcastReport::default()
        };

        for handle in &recipients {
            match handle.try_deliver(frame.clone()) {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::Dropped => report.dropped += 1,
                DeliveryOutcome::Skipped => {
                    debug!(conn_id = %handle.id, "Skipping inactive recipient");
                    report.skipped += 1;
                }
            }
        }

        self.metrics.record_broadcast(&report);
        report
    }
}
