//! The message-channel contract between the orchestrator and the seat and
//! train services.
//!
//! Two topics, one payload shape:
//!
//! | topic | event type | payload |
//! |---|---|---|
//! | `reservation.requested` | `ReservationRequested.v1` | `{reservationId, trainId, seatNumber, timestamp}` |
//! | `reservation.cancelled` | `ReservationCancelled.v1` | `{reservationId, trainId, seatNumber, timestamp}` |
//!
//! Every subscribing service reads both topics through one durable queue of
//! its own (see [`queues`]). Metadata carries an `event_id` unique per publish and a
//! `partition_key` of `trainId:seatNumber`, so transports that partition by
//! key keep one seat's events in order.

use crate::types::{ReservationId, TrainId};
use chrono::{DateTime, Utc};
use railseat_core::event::{Event, EventError, SerializedEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic for new reservations.
pub const RESERVATION_REQUESTED: &str = "reservation.requested";

/// Topic for cancelled reservations.
pub const RESERVATION_CANCELLED: &str = "reservation.cancelled";

/// Durable queue names, one per subscribing service.
///
/// Each queue is bound to both topics so a service sees one seat's request
/// and cancel in publish order.
pub mod queues {
    /// Seat store
    pub const SEAT_SERVICE: &str = "seat-service.reservations";
    /// Train inventory
    pub const TRAIN_SERVICE: &str = "train-service.reservations";

    /// Topics every queue is bound to.
    pub const TOPICS: [&str; 2] = [super::RESERVATION_REQUESTED, super::RESERVATION_CANCELLED];
}

/// A reservation row was written and its seat should be taken.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequested {
    /// Reservation that was written
    pub reservation_id: ReservationId,
    /// Train run
    pub train_id: TrainId,
    /// Seat on that run
    pub seat_number: String,
    /// When the orchestrator wrote the row
    pub timestamp: DateTime<Utc>,
}

impl Event for ReservationRequested {
    fn event_type(&self) -> &'static str {
        "ReservationRequested.v1"
    }
}

/// A reservation was cancelled and its seat should be released.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCancelled {
    /// Reservation that was cancelled
    pub reservation_id: ReservationId,
    /// Train run, copied from the reservation row
    pub train_id: TrainId,
    /// Seat, copied from the reservation row
    pub seat_number: String,
    /// When the orchestrator cancelled the row
    pub timestamp: DateTime<Utc>,
}

impl Event for ReservationCancelled {
    fn event_type(&self) -> &'static str {
        "ReservationCancelled.v1"
    }
}

/// Which of the two events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `reservation.requested`
    Requested,
    /// `reservation.cancelled`
    Cancelled,
}

impl EventKind {
    /// Topic this kind is published to.
    #[must_use]
    pub const fn topic(self) -> &'static str {
        match self {
            Self::Requested => RESERVATION_REQUESTED,
            Self::Cancelled => RESERVATION_CANCELLED,
        }
    }
}

/// Either event, decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationEvent {
    /// See [`ReservationRequested`]
    Requested(ReservationRequested),
    /// See [`ReservationCancelled`]
    Cancelled(ReservationCancelled),
}

impl ReservationEvent {
    /// Decode a transport event by its `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownEventType`] for any other type and
    /// [`EventError::DeserializationError`] for a malformed payload.
    pub fn decode(event: &SerializedEvent) -> Result<Self, EventError> {
        match event.event_type.as_str() {
            "ReservationRequested.v1" => {
                ReservationRequested::from_bytes(&event.data).map(Self::Requested)
            },
            "ReservationCancelled.v1" => {
                ReservationCancelled::from_bytes(&event.data).map(Self::Cancelled)
            },
            other => Err(EventError::UnknownEventType(other.to_string())),
        }
    }

    /// Encode for the transport, with a fresh `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be encoded.
    pub fn encode(&self) -> Result<SerializedEvent, EventError> {
        let metadata = serde_json::json!({
            "event_id": Uuid::new_v4().to_string(),
            "partition_key": format!("{}:{}", self.train_id(), self.seat_number()),
        });

        match self {
            Self::Requested(event) => SerializedEvent::from_event(event, Some(metadata)),
            Self::Cancelled(event) => SerializedEvent::from_event(event, Some(metadata)),
        }
    }

    /// Which event this is.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Requested(_) => EventKind::Requested,
            Self::Cancelled(_) => EventKind::Cancelled,
        }
    }

    /// Topic the event belongs on.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        self.kind().topic()
    }

    /// Reservation the event is about.
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        match self {
            Self::Requested(e) => e.reservation_id,
            Self::Cancelled(e) => e.reservation_id,
        }
    }

    /// Train run the event is about.
    #[must_use]
    pub const fn train_id(&self) -> TrainId {
        match self {
            Self::Requested(e) => e.train_id,
            Self::Cancelled(e) => e.train_id,
        }
    }

    /// Seat number the event is about.
    #[must_use]
    pub fn seat_number(&self) -> &str {
        match self {
            Self::Requested(e) => &e.seat_number,
            Self::Cancelled(e) => &e.seat_number,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use railseat_testing::test_clock;
    use railseat_core::environment::Clock;

    fn requested() -> ReservationEvent {
        ReservationEvent::Requested(ReservationRequested {
            reservation_id: ReservationId::new(1),
            train_id: TrainId::new(100),
            seat_number: "1A".to_string(),
            timestamp: test_clock().now(),
        })
    }

    #[test]
    fn payload_matches_wire_contract() {
        let encoded = requested().encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&encoded.data).unwrap();

        assert_eq!(encoded.event_type, "ReservationRequested.v1");
        assert_eq!(json["reservationId"], 1);
        assert_eq!(json["trainId"], 100);
        assert_eq!(json["seatNumber"], "1A");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn metadata_keys_by_seat() {
        let encoded = requested().encode().unwrap();
        assert_eq!(encoded.metadata_str("partition_key"), Some("100:1A"));

        let again = requested().encode().unwrap();
        assert_ne!(encoded.metadata_str("event_id"), again.metadata_str("event_id"));
    }

    #[test]
    fn decode_dispatches_on_event_type() {
        let decoded = ReservationEvent::decode(&requested().encode().unwrap()).unwrap();
        assert_eq!(decoded, requested());
        assert_eq!(decoded.topic(), RESERVATION_REQUESTED);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let event = SerializedEvent::new("SeatHeld.v1".to_string(), b"{}".to_vec(), None);
        assert!(matches!(
            ReservationEvent::decode(&event),
            Err(EventError::UnknownEventType(_))
        ));
    }

    #[test]
    fn queues_carry_both_topics() {
        assert_eq!(queues::TOPICS, [RESERVATION_REQUESTED, RESERVATION_CANCELLED]);
        assert_ne!(queues::SEAT_SERVICE, queues::TRAIN_SERVICE);
    }
}
