//! Real-time WebSocket engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound queue. Frames arriving while
    /// the queue is full are dropped for that connection.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Largest inbound WebSocket message accepted, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// WebSocket ping interval in seconds (0 disables keepalive pings).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// How long a closing connection may spend flushing its queue.
    #[serde(default = "default_close_grace")]
    pub close_grace_ms: u64,
}

impl RealtimeConfig {
    /// Keepalive interval, or `None` when pings are disabled.
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_seconds > 0).then(|| Duration::from_secs(self.ping_interval_seconds))
    }

    /// Flush window for closing connections.
    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer_size: default_outbound_buffer(),
            max_frame_bytes: default_max_frame_bytes(),
            ping_interval_seconds: default_ping_interval(),
            close_grace_ms: default_close_grace(),
        }
    }
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_max_frame_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_ping_interval() -> u64 {
    30
}

fn default_close_grace() -> u64 {
    1_000
}
