//! WebSocket message types and the JSON wire codec.

pub mod codec;
pub mod types;

pub use codec::{DecodeError, decode_inbound, encode_outbound};
pub use types::{InboundMessage, MessageKind, OutboundMessage};

/// One encoded outbound frame. Clones share the encoded buffer, so every
/// recipient of a broadcast gets the same bytes without copying.
pub type Frame = axum::extract::ws::Utf8Bytes;
