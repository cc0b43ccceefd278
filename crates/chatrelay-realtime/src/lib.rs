//! # chatrelay-realtime
//!
//! Real-time engine for the chat relay. Provides:
//!
//! - A concurrent connection registry with explicit liveness states
//! - Per-connection bounded outbound queues with drop-newest backpressure
//! - Broadcast fan-out with per-recipient failure isolation
//! - The chat/join wire codec with a never-reject normalization rule
//! - Engine-level delivery metrics

pub mod connection;
pub mod fanout;
pub mod message;
pub mod metrics;
pub mod server;

pub use connection::registry::ConnectionRegistry;
pub use fanout::{BroadcastReport, Broadcaster};
pub use server::RealtimeEngine;
