use serde_json::Value as JsonValue;
use thiserror::Error;

/// Failure to map between a stored `(event_type, payload)` pair and a typed
/// domain event.
///
/// `Unknown` is deliberately loud: an unregistered event kind means a new
/// variant was added without wiring it into `from_parts`, and silently
/// ignoring it would corrupt every read model folding that stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventKindError {
    /// The event kind is not part of this aggregate's closed event set.
    #[error("unknown event kind '{event_type}'")]
    Unknown { event_type: String },

    /// The kind is known but its payload did not deserialize.
    #[error("malformed payload for '{event_type}': {message}")]
    Payload { event_type: String, message: String },
}

impl EventKindError {
    pub fn unknown(event_type: impl Into<String>) -> Self {
        Self::Unknown {
            event_type: event_type.into(),
        }
    }

    pub fn payload(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Payload {
            event_type: event_type.into(),
            message: message.into(),
        }
    }
}

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
///
/// Each aggregate's events form a **closed set**: `event_type` and
/// `from_parts` are two sides of one exhaustive match, so adding an event
/// kind without updating the mapping is a compile-time error on the encode
/// side and an `EventKindError::Unknown` on the decode side.
///
/// Occurrence timestamps are not part of this trait: they are assigned by
/// the event store at append time and travel on the stored record, not on
/// the domain payload.
pub trait Event: Sized + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event kind identifier (e.g. "session.created").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event kind.
    fn schema_version(&self) -> u32 {
        1
    }

    /// Serialize the kind-specific payload (the variant's inner struct).
    fn to_payload(&self) -> serde_json::Result<JsonValue>;

    /// Reconstruct a typed event from its stored representation.
    fn from_parts(event_type: &str, payload: &JsonValue) -> Result<Self, EventKindError>;
}
