//! Domain events and their wire form.
//!
//! Events cross service boundaries, so the payload is JSON: any consumer in
//! any language can read it, and field names are part of the contract.
//!
//! # Example
//!
//! ```
//! use railseat_core::event::Event;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct SeatFreed {
//!     train_id: u64,
//!     seat_number: String,
//! }
//!
//! impl Event for SeatFreed {
//!     fn event_type(&self) -> &'static str {
//!         "SeatFreed.v1"
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Unknown event type encountered during deserialization.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An immutable fact published by one service for the others.
///
/// `event_type()` returns a stable, versioned identifier such as
/// `"ReservationRequested.v1"`. It travels next to the payload so a consumer
/// can pick the right type before decoding.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are not valid
    /// JSON for this type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// An event in transport form.
///
/// The payload is opaque JSON bytes; routing and idempotency hints live in
/// `metadata`:
/// - `event_id`: unique per publish
/// - `partition_key`: events with the same key must be applied in order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// The event type identifier (e.g., "ReservationRequested.v1").
    pub event_type: String,

    /// The JSON-encoded event payload.
    pub data: Vec<u8>,

    /// Optional metadata.
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Serialize a typed event.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Read a string field from the metadata object.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct SeatHeld {
        train_id: u64,
        seat_number: String,
    }

    impl Event for SeatHeld {
        fn event_type(&self) -> &'static str {
            "SeatHeld.v1"
        }
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn payload_is_camel_case_json() {
        let event = SeatHeld {
            train_id: 100,
            seat_number: "1A".to_string(),
        };

        let bytes = event.to_bytes().expect("serialization should succeed");
        let json: serde_json::Value =
            serde_json::from_slice(&bytes).expect("payload should be json");

        assert_eq!(json["trainId"], 100);
        assert_eq!(json["seatNumber"], "1A");
        assert_eq!(SeatHeld::from_bytes(&bytes).expect("decode"), event);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn metadata_lookup() {
        let event = SerializedEvent::from_event(
            &SeatHeld {
                train_id: 1,
                seat_number: "2B".to_string(),
            },
            Some(serde_json::json!({ "partition_key": "1:2B" })),
        )
        .expect("serialization should succeed");

        assert_eq!(event.event_type, "SeatHeld.v1");
        assert_eq!(event.metadata_str("partition_key"), Some("1:2B"));
        assert_eq!(event.metadata_str("missing"), None);
    }

    #[test]
    fn garbage_is_rejected() {
        let result = SeatHeld::from_bytes(b"not json");
        assert!(matches!(result, Err(EventError::DeserializationError(_))));
    }

    #[test]
    fn display_reports_size() {
        let serialized = SerializedEvent::new("SeatHeld.v1".to_string(), vec![1, 2, 3], None);
        assert!(format!("{serialized}").contains("3 bytes"));
    }
}
