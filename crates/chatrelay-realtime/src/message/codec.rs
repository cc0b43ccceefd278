//! JSON encoding and decoding for chat frames.

use serde_json::{Map, Value};
use thiserror::Error;

use super::Frame;
use super::types::{InboundMessage, OutboundMessage};

/// Why an inbound frame could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Payload is JSON but not an object.
    #[error("expected a JSON object")]
    NotAnObject,
}

/// Decode one client frame.
///
/// `{"type":"join"}` is a join; any other object is a chat message.
/// Missing or null `user`/`text` fields read as empty strings, and other
/// non-string values are kept as their JSON text. Any `ts` is ignored.
pub fn decode_inbound(raw: &[u8]) -> Result<InboundMessage, DecodeError> {
    let Value::Object(fields) = serde_json::from_slice::<Value>(raw)? else {
        return Err(DecodeError::NotAnObject);
    };

    let user = text_field(&fields, "user");
    if fields.get("type").and_then(Value::as_str) == Some("join") {
        return Ok(InboundMessage::Join { user });
    }

    Ok(InboundMessage::Chat {
        user,
        text: text_field(&fields, "text"),
    })
}

/// Encode a broadcast into a shareable frame.
pub fn encode_outbound(message: &OutboundMessage) -> Result<Frame, serde_json::Error> {
    serde_json::to_string(message).map(Frame::from)
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
