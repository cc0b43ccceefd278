//! Inbound and outbound chat message definitions.

use serde::Serialize;

/// Sender label used when a frame cannot be decoded.
pub const FALLBACK_SENDER: &str = "unknown";

/// Kind of a chat payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Regular chat text.
    Chat,
    /// Display name announcement.
    Join,
}

/// A decoded client frame. Client timestamps are never carried over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Chat text from `user`.
    Chat {
        /// Sender label as supplied by the client.
        user: String,
        /// Message body.
        text: String,
    },
    /// `user` joined or renamed.
    Join {
        /// Announced display name.
        user: String,
    },
}

impl InboundMessage {
    /// Substitute for a frame that could not be decoded: a chat message from
    /// [`FALLBACK_SENDER`] whose text is the raw payload.
    pub fn fallback(raw: &[u8]) -> Self {
        Self::Chat {
            user: FALLBACK_SENDER.to_string(),
            text: String::from_utf8_lossy(raw).into_owned(),
        }
    }

    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Chat { .. } => MessageKind::Chat,
            Self::Join { .. } => MessageKind::Join,
        }
    }

    /// Sender label.
    pub fn user(&self) -> &str {
        match self {
            Self::Chat { user, .. } | Self::Join { user } => user,
        }
    }

    /// Attach the server receipt time, producing the broadcast form.
    pub fn stamp(self, ts: i64) -> OutboundMessage {
        match self {
            Self::Chat { user, text } => OutboundMessage::Chat(ChatBroadcast { user, text, ts }),
            Self::Join { user } => OutboundMessage::Join(JoinBroadcast {
                kind: MessageKind::Join,
                user,
                ts,
            }),
        }
    }
}

/// A message as delivered to clients.
///
/// Join broadcasts carry `type` and no `text`; chat broadcasts carry no
/// `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// `{"type":"join","user":..,"ts":..}`
    Join(JoinBroadcast),
    /// `{"user":..,"text":..,"ts":..}`
    Chat(ChatBroadcast),
}

impl OutboundMessage {
    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Join(_) => MessageKind::Join,
            Self::Chat(_) => MessageKind::Chat,
        }
    }

    /// Server receipt time in milliseconds since the Unix epoch.
    pub fn ts(&self) -> i64 {
        match self {
            Self::Join(join) => join.ts,
            Self::Chat(chat) => chat.ts,
        }
    }
}

/// Join announcement broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinBroadcast {
    /// Always [`MessageKind::Join`].
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Announced display name.
    pub user: String,
    /// Server timestamp (ms).
    pub ts: i64,
}

/// Chat broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatBroadcast {
    /// Sender label.
    pub user: String,
    /// Message body.
    pub text: String,
    /// Server timestamp (ms).
    pub ts: i64,
}
