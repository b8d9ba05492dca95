//! Outbound action envelopes
//!
//! Every frame the client sends is a JSON object tagged by `action`.

use serde::{Deserialize, Serialize};

/// Outbound action envelope
///
/// Serialized with an internal `action` tag, e.g.
/// `{"action":"message","chat_id":"c1","content":"hi"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum OutboundAction {
    /// Chat message to a conversation
    Message { chat_id: String, content: String },
    /// Typing indicator for a conversation
    Typing { chat_id: String, is_typing: bool },
    /// Presence heartbeat
    Heartbeat { is_online: bool },
    /// Start receiving events for a conversation
    Subscribe { chat_id: String },
    /// Stop receiving events for a conversation
    Unsubscribe { chat_id: String },
}

impl OutboundAction {
    #[must_use]
    pub fn message(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Message {
            chat_id: chat_id.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn typing(chat_id: impl Into<String>, is_typing: bool) -> Self {
        Self::Typing {
            chat_id: chat_id.into(),
            is_typing,
        }
    }

    #[must_use]
    pub fn heartbeat(is_online: bool) -> Self {
        Self::Heartbeat { is_online }
    }

    #[must_use]
    pub fn subscribe(chat_id: impl Into<String>) -> Self {
        Self::Subscribe {
            chat_id: chat_id.into(),
        }
    }

    #[must_use]
    pub fn unsubscribe(chat_id: impl Into<String>) -> Self {
        Self::Unsubscribe {
            chat_id: chat_id.into(),
        }
    }

    /// Wire name of the `action` discriminant
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Typing { .. } => "typing",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
        }
    }

    /// Conversation this action targets, if any
    #[must_use]
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Message { chat_id, .. }
            | Self::Typing { chat_id, .. }
            | Self::Subscribe { chat_id }
            | Self::Unsubscribe { chat_id } => Some(chat_id),
            Self::Heartbeat { .. } => None,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for OutboundAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.chat_id() {
            Some(chat_id) => write!(f, "OutboundAction({}, chat_id={chat_id})", self.name()),
            None => write!(f, "OutboundAction({})", self.name()),
        }
    }
}
