//! WebSocket connection tracking: handles, liveness and the registry.

pub mod handle;
pub mod registry;

pub use handle::{ConnectionHandle, ConnectionId, ConnectionState, DeliveryOutcome};
pub use registry::ConnectionRegistry;
