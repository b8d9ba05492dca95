//! Inbound event frames
//!
//! The connection manager does not interpret inbound frames beyond parsing
//! them as JSON. Listeners use the helpers here to pick out the events they
//! care about.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Discriminants the backend is known to send in the `type` field
pub mod event_types {
    pub const MESSAGE: &str = "message";
    pub const TYPING: &str = "typing";
    pub const PRESENCE: &str = "presence";
}

/// A parsed inbound frame
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent(Value);

impl InboundEvent {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(Self)
    }

    /// The `type` discriminant, when the frame is an object that carries one
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Check the `type` discriminant
    #[must_use]
    pub fn is(&self, event_type: &str) -> bool {
        self.event_type() == Some(event_type)
    }

    /// Look up a top-level field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Decode the whole frame into a typed payload
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for InboundEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for InboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.event_type() {
            Some(t) => write!(f, "InboundEvent(type={t})"),
            None => write!(f, "InboundEvent"),
        }
    }
}
