//! Event handlers for the seat store and the train inventory.
//!
//! Both services react to the same two topics:
//!
//! | service | `reservation.requested` | `reservation.cancelled` |
//! |---|---|---|
//! | seat store | reserve `(trainId, seatNumber)` | cancel `(trainId, seatNumber)` |
//! | train inventory | decrement | increment |
//!
//! What happens when the local mutation fails is a [`FailurePolicy`] chosen
//! per service and per topic. Defaults: the seat store drops failed
//! `requested` events (the losing side of a seat race ends up here) and
//! propagates everything else.

use crate::app::{SeatService, TrainService};
use crate::error::ReservationError;
use crate::events::{EventKind, ReservationEvent};
use crate::types::{ReservationId, SeatRef};
use async_trait::async_trait;
use railseat_core::event::{EventError, SerializedEvent};
use railseat_runtime::metrics::{ConsumerMetrics, ConsumerOutcome};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Handler for one delivery.
///
/// Called once per event, in queue order; the consumer does not call it
/// again until the previous call returned.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the event could not be applied and the
    /// policy says so. The consumer logs it and moves on.
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError>;
}

/// Why a delivery was not applied.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The payload is not one of the two reservation events
    #[error("undecodable event: {0}")]
    Decode(#[from] EventError),

    /// The local mutation was refused
    #[error("{event} for reservation {reservation_id} not applied: {source}")]
    Rejected {
        /// Event type
        event: &'static str,
        /// Reservation the event was about
        reservation_id: ReservationId,
        /// Domain error
        source: ReservationError,
    },
}

// ============================================================================
// Failure policy
// ============================================================================

/// What a consumer does with a failed local mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log at `warn` and treat the event as handled
    DropAndLog,
    /// Hand the error to the consumer loop, which logs it at `error`
    Propagate,
}

impl FailurePolicy {
    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropAndLog => "drop-and-log",
            Self::Propagate => "propagate",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop-and-log" | "drop" => Ok(Self::DropAndLog),
            "propagate" => Ok(Self::Propagate),
            other => Err(format!(
                "unknown failure policy '{other}' (expected drop-and-log or propagate)"
            )),
        }
    }
}

/// Policy per topic for one service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopicPolicies {
    /// For `reservation.requested`
    pub on_requested: FailurePolicy,
    /// For `reservation.cancelled`
    pub on_cancelled: FailurePolicy,
}

impl TopicPolicies {
    /// Seat store defaults.
    #[must_use]
    pub const fn seat_defaults() -> Self {
        Self {
            on_requested: FailurePolicy::DropAndLog,
            on_cancelled: FailurePolicy::Propagate,
        }
    }

    /// Train inventory defaults.
    #[must_use]
    pub const fn train_defaults() -> Self {
        Self {
            on_requested: FailurePolicy::Propagate,
            on_cancelled: FailurePolicy::Propagate,
        }
    }

    const fn for_kind(self, kind: EventKind) -> FailurePolicy {
        match kind {
            EventKind::Requested => self.on_requested,
            EventKind::Cancelled => self.on_cancelled,
        }
    }
}

// ============================================================================
// Redelivery log
// ============================================================================

/// Events a consumer already applied, keyed by topic and reservation.
///
/// Delivery is at-least-once, so a redelivered `requested` event would hit
/// the seat store's conflict check (and be dropped) but would decrement the
/// train counter a second time. With the log enabled, an event whose key
/// was already applied is skipped. Disabled, it records nothing and skips
/// nothing.
#[derive(Debug, Default)]
pub struct ProcessedLog {
    enabled: bool,
    applied: Mutex<HashSet<(EventKind, ReservationId)>>,
}

impl ProcessedLog {
    /// A log that remembers applied events.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            applied: Mutex::default(),
        }
    }

    /// A log that never skips.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// `enabled()` or `disabled()`.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        if enabled { Self::enabled() } else { Self::disabled() }
    }

    /// Whether `(kind, id)` was applied before.
    #[must_use]
    pub fn contains(&self, kind: EventKind, id: ReservationId) -> bool {
        self.enabled
            && self
                .applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&(kind, id))
    }

    /// Remember `(kind, id)` as applied.
    pub fn record(&self, kind: EventKind, id: ReservationId) {
        if self.enabled {
            self.applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert((kind, id));
        }
    }
}

// ============================================================================
// Shared outcome handling
// ============================================================================

fn event_label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Requested => "ReservationRequested",
        EventKind::Cancelled => "ReservationCancelled",
    }
}

fn settle(
    consumer: &'static str,
    policy: FailurePolicy,
    processed: &ProcessedLog,
    event: &ReservationEvent,
    result: Result<(), ReservationError>,
) -> Result<(), HandlerError> {
    let kind = event.kind();
    match result {
        Ok(()) => {
            processed.record(kind, event.reservation_id());
            ConsumerMetrics::record(consumer, ConsumerOutcome::Applied);
            Ok(())
        },
        Err(error) => match policy {
            FailurePolicy::DropAndLog => {
                tracing::warn!(
                    consumer,
                    topic = kind.topic(),
                    reservation_id = %event.reservation_id(),
                    train_id = %event.train_id(),
                    seat_number = %event.seat_number(),
                    error = %error,
                    "Event dropped"
                );
                ConsumerMetrics::record(consumer, ConsumerOutcome::Dropped);
                Ok(())
            },
            FailurePolicy::Propagate => {
                ConsumerMetrics::record(consumer, ConsumerOutcome::Failed);
                Err(HandlerError::Rejected {
                    event: event_label(kind),
                    reservation_id: event.reservation_id(),
                    source: error,
                })
            },
        },
    }
}

fn already_applied(consumer: &'static str, processed: &ProcessedLog, event: &ReservationEvent) -> bool {
    if processed.contains(event.kind(), event.reservation_id()) {
        tracing::debug!(
            consumer,
            topic = event.topic(),
            reservation_id = %event.reservation_id(),
            "Redelivered event skipped"
        );
        ConsumerMetrics::record(consumer, ConsumerOutcome::Duplicate);
        return true;
    }
    false
}

// ============================================================================
// Seat store
// ============================================================================

/// Flips seat flags from reservation events.
pub struct SeatEventHandler {
    seats: SeatService,
    policies: TopicPolicies,
    processed: ProcessedLog,
}

impl SeatEventHandler {
    /// Consumer name used in logs and metrics.
    pub const NAME: &'static str = "seat-service";

    /// Handler over `seats`.
    #[must_use]
    pub fn new(seats: SeatService, policies: TopicPolicies, processed: ProcessedLog) -> Self {
        Self {
            seats,
            policies,
            processed,
        }
    }
}

#[async_trait]
impl EventHandler for SeatEventHandler {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let event = ReservationEvent::decode(event)?;
        if already_applied(Self::NAME, &self.processed, &event) {
            return Ok(());
        }

        let seat = SeatRef::position(event.train_id(), event.seat_number());
        let result = match event.kind() {
            EventKind::Requested => self.seats.reserve(seat).await,
            EventKind::Cancelled => self.seats.cancel(seat).await,
        };

        settle(
            Self::NAME,
            self.policies.for_kind(event.kind()),
            &self.processed,
            &event,
            result.map(|_| ()),
        )
    }
}

// ============================================================================
// Train inventory
// ============================================================================

/// Moves available-seat counters from reservation events.
pub struct TrainEventHandler {
    trains: TrainService,
    policies: TopicPolicies,
    processed: ProcessedLog,
}

impl TrainEventHandler {
    /// Consumer name used in logs and metrics.
    pub const NAME: &'static str = "train-service";

    /// Handler over `trains`.
    #[must_use]
    pub fn new(trains: TrainService, policies: TopicPolicies, processed: ProcessedLog) -> Self {
        Self {
            trains,
            policies,
            processed,
        }
    }
}

#[async_trait]
impl EventHandler for TrainEventHandler {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let event = ReservationEvent::decode(event)?;
        if already_applied(Self::NAME, &self.processed, &event) {
            return Ok(());
        }

        let result = match event.kind() {
            EventKind::Requested => self.trains.decrement_available_seats(event.train_id()).await,
            EventKind::Cancelled => self.trains.increment_available_seats(event.train_id()).await,
        };

        settle(
            Self::NAME,
            self.policies.for_kind(event.kind()),
            &self.processed,
            &event,
            result.map(|_| ()),
        )
    }
}
