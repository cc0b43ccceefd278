//! Individual WebSocket connection handle.

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::message::Frame;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// Display name reported for connections that have not sent a `join` yet.
pub const UNKNOWN_DISPLAY_NAME: &str = "unknown";

/// Liveness of a connection.
///
/// Transitions only move forward: `Active -> Closing -> Closed`
/// (or straight from `Active` to `Closed` on deregistration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Accepting outbound frames.
    Active,
    /// Transport is going away; the queue is being flushed, no new frames.
    Closing,
    /// Removed from the registry.
    Closed,
}

/// Result of offering one frame to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Frame was enqueued.
    Delivered,
    /// Queue was full; the frame was discarded for this connection.
    Dropped,
    /// Connection is no longer active; nothing was enqueued.
    Skipped,
}

/// A handle to a single WebSocket connection.
///
/// Holds the sending half of the connection's bounded outbound queue plus
/// its liveness state and display name. Only the fan-out enqueues through
/// the handle; the session that owns the socket drains the receiver.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Registration order, used to keep snapshots stable
    pub(crate) seq: u64,
    /// Name announced by the client's latest `join`
    display_name: RwLock<Option<String>>,
    /// Liveness, observable by the session's drain task
    state: watch::Sender<ConnectionState>,
    /// Sender for outbound frames
    sender: mpsc::Sender<Frame>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub(crate) fn new(seq: u64, sender: mpsc::Sender<Frame>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Active);
        Self {
            id: Uuid::new_v4(),
            seq,
            display_name: RwLock::new(None),
            state,
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Offer a frame to this connection without waiting.
    ///
    /// A full queue drops the frame (newest loses). A queue whose receiver
    /// is gone moves the connection to `Closing`.
    pub fn try_deliver(&self, frame: Frame) -> DeliveryOutcome {
        if !self.is_active() {
            return DeliveryOutcome::Skipped;
        }
        match self.sender.try_send(frame) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Outbound queue full, dropping frame");
                DeliveryOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.begin_close();
                DeliveryOutcome::Skipped
            }
        }
    }

    /// Current liveness state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the connection still accepts frames.
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Subscribe to liveness transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// `Active -> Closing`. Returns false if the connection was not active.
    pub(crate) fn begin_close(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Active {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        })
    }

    /// `Active | Closing -> Closed`. Returns false if already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        })
    }

    /// Display name, or [`UNKNOWN_DISPLAY_NAME`] before the first `join`.
    pub async fn display_name(&self) -> String {
        self.display_name
            .read()
            .await
            .clone()
            .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string())
    }

    pub(crate) async fn set_display_name(&self, name: &str) {
        let mut current = self.display_name.write().await;
        if current.as_deref() != Some(name) {
            *current = Some(name.to_string());
        }
    }
}
