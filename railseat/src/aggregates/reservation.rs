//! Reservation orchestrator aggregate.
//!
//! Holds reservation rows and turns each write into a domain event for the
//! seat and train services. The row and its publish form one unit: when the
//! bus rejects the event after retries, the row change is rolled back
//! (a new row is removed, a cancelled row gets its previous status back) and
//! the failure is kept for the caller to report.

use crate::error::{Entity, ReservationError};
use crate::events::{EventKind, ReservationCancelled, ReservationEvent, ReservationRequested};
use crate::types::{
    Reservation, ReservationId, ReservationStatus, RiderId, SeatId, TrainId,
};
use railseat_core::{
    SmallVec, effect::Effect, environment::Clock, event::SerializedEvent, event_bus::EventBus,
    publish_event, reducer::Reducer, smallvec,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Reservation rows, plus per-command bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct ReservationState {
    /// Every row, cancelled ones included
    pub reservations: BTreeMap<ReservationId, Reservation>,
    /// Highest id handed out so far
    pub last_id: u64,
    /// Result of the most recent command
    pub last_outcome: Option<Result<Reservation, ReservationError>>,
    /// Publishes that failed, by reservation and event kind
    pub publish_failures: HashMap<(ReservationId, EventKind), String>,
}

impl ReservationState {
    /// Create empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A row that has not been cancelled.
    #[must_use]
    pub fn live(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations
            .get(&id)
            .filter(|reservation| reservation.status.is_live())
    }

    /// Live rows of one rider, oldest first.
    #[must_use]
    pub fn live_for_rider(&self, rider_id: RiderId) -> Vec<Reservation> {
        self.reservations
            .values()
            .filter(|r| r.rider_id == rider_id && r.status.is_live())
            .cloned()
            .collect()
    }

    /// Why the publish of `kind` for `id` failed, if it did.
    #[must_use]
    pub fn publish_failure(&self, id: ReservationId, kind: EventKind) -> Option<String> {
        self.publish_failures.get(&(id, kind)).cloned()
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// How to undo a row change whose event never left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rollback {
    /// Drop the row that was just written
    Remove,
    /// Put the status back
    Restore(ReservationStatus),
}

/// Actions for the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationAction {
    // Commands
    /// Write a new row. Validation already happened against the collaborators.
    Record {
        /// Owning rider
        rider_id: RiderId,
        /// Train run
        train_id: TrainId,
        /// Seat row at validation time
        seat_id: SeatId,
        /// Seat number, copied
        seat_number: String,
        /// `Pending` when seat and train follow by event, `Confirmed` otherwise
        status: ReservationStatus,
        /// Publish `reservation.requested`
        announce: bool,
    },

    /// Cancel a live row
    Cancel {
        /// Row to cancel
        id: ReservationId,
        /// Publish `reservation.cancelled`
        announce: bool,
    },

    // Events
    /// A row was written
    Recorded {
        /// The row
        reservation: Reservation,
    },

    /// A row was cancelled
    Cancelled {
        /// Row id
        id: ReservationId,
    },

    /// The bus rejected an event; the row change is rolled back
    PublishFailed {
        /// Row the event was about
        reservation_id: ReservationId,
        /// Which event
        kind: EventKind,
        /// How to undo the row change
        rollback: Rollback,
        /// Bus error
        error: String,
    },

    /// A command was refused
    Rejected {
        /// Why
        error: ReservationError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment for the orchestrator.
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Clock for `reserved_at` and event timestamps
    pub clock: Arc<dyn Clock>,
    /// Bus the domain events go to
    pub event_bus: Arc<dyn EventBus>,
}

impl ReservationEnvironment {
    /// Creates a new `ReservationEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, event_bus: Arc<dyn EventBus>) -> Self {
        Self { clock, event_bus }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the orchestrator.
#[derive(Clone, Debug, Default)]
pub struct ReservationReducer;

impl ReservationReducer {
    /// Creates a new `ReservationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn encode(event: &ReservationEvent) -> Result<SerializedEvent, ReservationError> {
        event
            .encode()
            .map_err(|e| ReservationError::Unavailable(format!("event encoding failed: {e}")))
    }

    fn publish(
        env: &ReservationEnvironment,
        serialized: SerializedEvent,
        reservation_id: ReservationId,
        kind: EventKind,
        rollback: Rollback,
    ) -> Effect<ReservationAction> {
        publish_event! {
            bus: env.event_bus,
            topic: kind.topic(),
            event: serialized,
            on_success: || None,
            on_error: |error| Some(ReservationAction::PublishFailed {
                reservation_id,
                kind,
                rollback,
                error: error.to_string(),
            })
        }
    }

    /// Applies an event to state
    fn apply_event(state: &mut ReservationState, action: &ReservationAction) {
        match action {
            ReservationAction::Recorded { reservation } => {
                state.last_id = state.last_id.max(reservation.id.value());
                state
                    .reservations
                    .insert(reservation.id, reservation.clone());
                state.last_outcome = Some(Ok(reservation.clone()));
            },

            ReservationAction::Cancelled { id } => {
                if let Some(reservation) = state.reservations.get_mut(id) {
                    reservation.status = ReservationStatus::Cancelled;
                    state.last_outcome = Some(Ok(reservation.clone()));
                }
            },

            ReservationAction::PublishFailed {
                reservation_id,
                kind,
                rollback,
                error,
            } => {
                tracing::error!(
                    reservation_id = %reservation_id,
                    topic = kind.topic(),
                    error = %error,
                    "Event not published, rolling back reservation change"
                );
                match rollback {
                    Rollback::Remove => {
                        state.reservations.remove(reservation_id);
                    },
                    Rollback::Restore(status) => {
                        if let Some(reservation) = state.reservations.get_mut(reservation_id) {
                            reservation.status = *status;
                        }
                    },
                }
                state
                    .publish_failures
                    .insert((*reservation_id, *kind), error.clone());
            },

            ReservationAction::Rejected { error } => {
                state.last_outcome = Some(Err(error.clone()));
            },

            // Commands don't modify state
            ReservationAction::Record { .. } | ReservationAction::Cancel { .. } => {},
        }
    }

    fn reject(
        state: &mut ReservationState,
        error: ReservationError,
    ) -> SmallVec<[Effect<ReservationAction>; 4]> {
        tracing::debug!(error = %error, "Reservation command rejected");
        Self::apply_event(state, &ReservationAction::Rejected { error });
        SmallVec::new()
    }
}

impl Reducer for ReservationReducer {
    type State = ReservationState;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            ReservationAction::Record {
                rider_id,
                train_id,
                seat_id,
                seat_number,
                status,
                announce,
            } => {
                let now = env.clock.now();
                let reservation = Reservation {
                    id: ReservationId::new(state.last_id + 1),
                    rider_id,
                    train_id,
                    seat_id,
                    seat_number,
                    reserved_at: now,
                    status,
                };

                let serialized = if announce {
                    let event = ReservationEvent::Requested(ReservationRequested {
                        reservation_id: reservation.id,
                        train_id,
                        seat_number: reservation.seat_number.clone(),
                        timestamp: now,
                    });
                    match Self::encode(&event) {
                        Ok(serialized) => Some(serialized),
                        Err(error) => return Self::reject(state, error),
                    }
                } else {
                    None
                };

                let id = reservation.id;
                tracing::info!(
                    reservation_id = %id,
                    rider_id = %rider_id,
                    train_id = %train_id,
                    seat_number = %reservation.seat_number,
                    status = %status,
                    "Reservation recorded"
                );
                Self::apply_event(state, &ReservationAction::Recorded { reservation });

                match serialized {
                    Some(serialized) => smallvec![Self::publish(
                        env,
                        serialized,
                        id,
                        EventKind::Requested,
                        Rollback::Remove,
                    )],
                    None => SmallVec::new(),
                }
            },

            ReservationAction::Cancel { id, announce } => {
                let Some(reservation) = state.live(id).cloned() else {
                    return Self::reject(state, ReservationError::NotFound(Entity::Reservation));
                };

                let serialized = if announce {
                    let event = ReservationEvent::Cancelled(ReservationCancelled {
                        reservation_id: id,
                        train_id: reservation.train_id,
                        seat_number: reservation.seat_number.clone(),
                        timestamp: env.clock.now(),
                    });
                    match Self::encode(&event) {
                        Ok(serialized) => Some(serialized),
                        Err(error) => return Self::reject(state, error),
                    }
                } else {
                    None
                };

                state.publish_failures.remove(&(id, EventKind::Cancelled));
                tracing::info!(
                    reservation_id = %id,
                    train_id = %reservation.train_id,
                    seat_number = %reservation.seat_number,
                    "Reservation cancelled"
                );
                Self::apply_event(state, &ReservationAction::Cancelled { id });

                match serialized {
                    Some(serialized) => smallvec![Self::publish(
                        env,
                        serialized,
                        id,
                        EventKind::Cancelled,
                        Rollback::Restore(reservation.status),
                    )],
                    None => SmallVec::new(),
                }
            },

            // ========== Events ==========
            event @ (ReservationAction::Recorded { .. }
            | ReservationAction::Cancelled { .. }
            | ReservationAction::PublishFailed { .. }
            | ReservationAction::Rejected { .. }) => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::events::{RESERVATION_CANCELLED, RESERVATION_REQUESTED};
    use railseat_testing::{RecordingEventBus, ReducerTest, assertions, test_clock};

    fn env() -> ReservationEnvironment {
        ReservationEnvironment::new(Arc::new(test_clock()), Arc::new(RecordingEventBus::new()))
    }

    fn record(announce: bool) -> ReservationAction {
        ReservationAction::Record {
            rider_id: RiderId::new(1),
            train_id: TrainId::new(100),
            seat_id: SeatId::new(1),
            seat_number: "1A".to_string(),
            status: if announce {
                ReservationStatus::Pending
            } else {
                ReservationStatus::Confirmed
            },
            announce,
        }
    }

    fn state_with_pending() -> ReservationState {
        let mut state = ReservationState::new();
        let _ = ReservationReducer::new().reduce(&mut state, record(true), &env());
        state
    }

    #[test]
    fn record_writes_pending_row_and_publishes_requested() {
        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(ReservationState::new())
            .when_action(record(true))
            .then_state(|state| {
                let row = state.live(ReservationId::new(1)).unwrap();
                assert_eq!(row.status, ReservationStatus::Pending);
                assert_eq!(row.seat_number, "1A");
                assert_eq!(row.reserved_at, test_clock().now());
            })
            .then_effects(|effects| {
                assertions::assert_published_topics(effects, &[RESERVATION_REQUESTED]);
            })
            .run();
    }

    #[test]
    fn silent_record_publishes_nothing() {
        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(ReservationState::new())
            .when_action(record(false))
            .then_state(|state| {
                let row = state.live(ReservationId::new(1)).unwrap();
                assert_eq!(row.status, ReservationStatus::Confirmed);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn cancel_unknown_is_not_found_without_effects() {
        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(ReservationState::new())
            .when_action(ReservationAction::Cancel {
                id: ReservationId::new(42),
                announce: true,
            })
            .then_state(|state| {
                assert_eq!(
                    state.last_outcome,
                    Some(Err(ReservationError::NotFound(Entity::Reservation)))
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn cancel_marks_row_and_publishes_cancelled() {
        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(state_with_pending())
            .when_action(ReservationAction::Cancel {
                id: ReservationId::new(1),
                announce: true,
            })
            .then_state(|state| {
                assert!(state.live(ReservationId::new(1)).is_none());
                assert!(state.live_for_rider(RiderId::new(1)).is_empty());
            })
            .then_effects(|effects| {
                assertions::assert_published_topics(effects, &[RESERVATION_CANCELLED]);
            })
            .run();
    }

    #[test]
    fn second_cancel_is_not_found() {
        let cancel = ReservationAction::Cancel {
            id: ReservationId::new(1),
            announce: true,
        };

        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(state_with_pending())
            .given_action(cancel.clone())
            .when_action(cancel)
            .then_state(|state| {
                assert_eq!(
                    state.last_outcome,
                    Some(Err(ReservationError::NotFound(Entity::Reservation)))
                );
            })
            .then_effects(|effects| assert!(effects.is_empty()))
            .run();
    }

    #[test]
    fn failed_requested_publish_removes_row() {
        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(ReservationState::new())
            .when_action(record(true))
            .publish_rejected("broker down")
            .then_state(|state| {
                assert!(state.reservations.is_empty());
                let failure = state
                    .publish_failure(ReservationId::new(1), EventKind::Requested)
                    .unwrap();
                assert!(failure.contains("broker down"));
            })
            .run();
    }

    #[test]
    fn accepted_requested_publish_keeps_row() {
        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(ReservationState::new())
            .when_action(record(true))
            .publish_accepted()
            .then_state(|state| {
                assert!(state.live(ReservationId::new(1)).is_some());
                assert!(
                    state
                        .publish_failure(ReservationId::new(1), EventKind::Requested)
                        .is_none()
                );
            })
            .run();
    }

    #[test]
    fn failed_cancelled_publish_restores_status() {
        ReducerTest::new(ReservationReducer::new())
            .with_env(env())
            .given_state(state_with_pending())
            .when_action(ReservationAction::Cancel {
                id: ReservationId::new(1),
                announce: true,
            })
            .publish_rejected("broker down")
            .then_state(|state| {
                let row = state.live(ReservationId::new(1)).unwrap();
                assert_eq!(row.status, ReservationStatus::Pending);
            })
            .run();
    }

    #[test]
    fn ids_are_not_reused_after_rollback() {
        let mut state = state_with_pending();
        let _ = ReservationReducer::new().reduce(
            &mut state,
            ReservationAction::PublishFailed {
                reservation_id: ReservationId::new(1),
                kind: EventKind::Requested,
                rollback: Rollback::Remove,
                error: "broker down".to_string(),
            },
            &env(),
        );
        let _ = ReservationReducer::new().reduce(&mut state, record(true), &env());

        assert!(state.live(ReservationId::new(2)).is_some());
    }
}
