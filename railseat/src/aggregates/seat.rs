//! Seat store aggregate.
//!
//! Owns the reserved flag of every seat. The check-then-set in
//! [`SeatAction::ReserveSeat`] runs inside the store's write lock, which makes
//! this reducer the one place where double booking is actually prevented.

use crate::error::{ConflictKind, Entity, ReservationError};
use crate::types::{Seat, SeatId, SeatRef, TrainId};
use chrono::{DateTime, Utc};
use railseat_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Seats by id, plus the outcome of the last command.
#[derive(Clone, Debug, Default)]
pub struct SeatState {
    /// Every registered seat
    pub seats: BTreeMap<SeatId, Seat>,
    /// Result of the most recent command
    pub last_outcome: Option<Result<Seat, ReservationError>>,
}

impl SeatState {
    /// Create empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a seat up by id or by position.
    #[must_use]
    pub fn resolve(&self, seat: &SeatRef) -> Option<&Seat> {
        match seat {
            SeatRef::Id(id) => self.seats.get(id),
            SeatRef::Position {
                train_id,
                seat_number,
            } => self
                .seats
                .values()
                .find(|s| s.train_id == *train_id && s.seat_number == *seat_number),
        }
    }

    /// Seats of one train in id order.
    #[must_use]
    pub fn by_train(&self, train_id: TrainId) -> Vec<Seat> {
        self.seats
            .values()
            .filter(|s| s.train_id == train_id)
            .cloned()
            .collect()
    }

    /// Outcome of the last command, if any.
    #[must_use]
    pub fn last_outcome(&self) -> Option<Result<Seat, ReservationError>> {
        self.last_outcome.clone()
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the seat store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeatAction {
    // Commands
    /// Add a free seat to a train
    RegisterSeat {
        /// Seat identity
        id: SeatId,
        /// Train run
        train_id: TrainId,
        /// Seat number, unique within the train
        seat_number: String,
    },

    /// Set the flag; fails if already set
    ReserveSeat {
        /// Which seat
        seat: SeatRef,
    },

    /// Clear the flag; fails if already clear
    CancelSeat {
        /// Which seat
        seat: SeatRef,
    },

    // Events
    /// A seat was added
    SeatRegistered {
        /// The new row
        seat: Seat,
    },

    /// A seat flag was set
    SeatReserved {
        /// Seat row
        seat_id: SeatId,
        /// When
        reserved_at: DateTime<Utc>,
    },

    /// A seat flag was cleared
    SeatReleased {
        /// Seat row
        seat_id: SeatId,
    },

    /// A command was refused
    SeatRejected {
        /// Why
        error: ReservationError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment for the seat store.
#[derive(Clone)]
pub struct SeatEnvironment {
    /// Clock for `reserved_at`
    pub clock: Arc<dyn Clock>,
}

impl SeatEnvironment {
    /// Creates a new `SeatEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the seat store.
#[derive(Clone, Debug, Default)]
pub struct SeatReducer;

impl SeatReducer {
    /// Creates a new `SeatReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_register(
        state: &SeatState,
        id: SeatId,
        train_id: TrainId,
        seat_number: &str,
    ) -> Result<(), ReservationError> {
        if seat_number.trim().is_empty() {
            return Err(ReservationError::InvalidInput(
                "seat number must not be empty".to_string(),
            ));
        }
        if state.seats.contains_key(&id) {
            return Err(ReservationError::InvalidInput(format!(
                "seat #{id} already exists"
            )));
        }
        if state
            .resolve(&SeatRef::position(train_id, seat_number))
            .is_some()
        {
            return Err(ReservationError::InvalidInput(format!(
                "seat {seat_number} already exists on train {train_id}"
            )));
        }
        Ok(())
    }

    /// Resolve the seat and check the flag is in `required` state.
    fn validate_flip(
        state: &SeatState,
        seat: &SeatRef,
        required: bool,
    ) -> Result<SeatId, ReservationError> {
        let found = state
            .resolve(seat)
            .ok_or(ReservationError::NotFound(Entity::Seat))?;

        match (found.reserved, required) {
            (true, false) => Err(ReservationError::Conflict(ConflictKind::SeatAlreadyReserved)),
            (false, true) => Err(ReservationError::Conflict(ConflictKind::SeatNotReserved)),
            _ => Ok(found.id),
        }
    }

    /// Applies an event to state
    fn apply_event(state: &mut SeatState, action: &SeatAction) {
        match action {
            SeatAction::SeatRegistered { seat } => {
                state.seats.insert(seat.id, seat.clone());
                state.last_outcome = Some(Ok(seat.clone()));
            },

            SeatAction::SeatReserved {
                seat_id,
                reserved_at,
            } => {
                if let Some(seat) = state.seats.get_mut(seat_id) {
                    seat.reserved = true;
                    seat.reserved_at = Some(*reserved_at);
                    state.last_outcome = Some(Ok(seat.clone()));
                }
            },

            SeatAction::SeatReleased { seat_id } => {
                if let Some(seat) = state.seats.get_mut(seat_id) {
                    seat.reserved = false;
                    state.last_outcome = Some(Ok(seat.clone()));
                }
            },

            SeatAction::SeatRejected { error } => {
                state.last_outcome = Some(Err(error.clone()));
            },

            // Commands don't modify state
            SeatAction::RegisterSeat { .. }
            | SeatAction::ReserveSeat { .. }
            | SeatAction::CancelSeat { .. } => {},
        }
    }

    fn reject(state: &mut SeatState, error: ReservationError) {
        tracing::debug!(error = %error, "Seat command rejected");
        Self::apply_event(state, &SeatAction::SeatRejected { error });
    }
}

impl Reducer for SeatReducer {
    type State = SeatState;
    type Action = SeatAction;
    type Environment = SeatEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            SeatAction::RegisterSeat {
                id,
                train_id,
                seat_number,
            } => match Self::validate_register(state, id, train_id, &seat_number) {
                Ok(()) => Self::apply_event(
                    state,
                    &SeatAction::SeatRegistered {
                        seat: Seat::new(id, train_id, seat_number),
                    },
                ),
                Err(error) => Self::reject(state, error),
            },

            SeatAction::ReserveSeat { seat } => match Self::validate_flip(state, &seat, false) {
                Ok(seat_id) => {
                    tracing::debug!(seat_id = %seat_id, "Seat reserved");
                    Self::apply_event(
                        state,
                        &SeatAction::SeatReserved {
                            seat_id,
                            reserved_at: env.clock.now(),
                        },
                    );
                },
                Err(error) => Self::reject(state, error),
            },

            SeatAction::CancelSeat { seat } => match Self::validate_flip(state, &seat, true) {
                Ok(seat_id) => {
                    tracing::debug!(seat_id = %seat_id, "Seat released");
                    Self::apply_event(state, &SeatAction::SeatReleased { seat_id });
                },
                Err(error) => Self::reject(state, error),
            },

            // ========== Events ==========
            event @ (SeatAction::SeatRegistered { .. }
            | SeatAction::SeatReserved { .. }
            | SeatAction::SeatReleased { .. }
            | SeatAction::SeatRejected { .. }) => Self::apply_event(state, &event),
        }

        SmallVec::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use railseat_testing::{ReducerTest, assertions, test_clock};

    fn env() -> SeatEnvironment {
        SeatEnvironment::new(Arc::new(test_clock()))
    }

    fn train() -> TrainId {
        TrainId::new(100)
    }

    fn state_with(seats: &[(u64, &str, bool)]) -> SeatState {
        let mut state = SeatState::new();
        for (id, number, reserved) in seats {
            let mut seat = Seat::new(SeatId::new(*id), train(), *number);
            seat.reserved = *reserved;
            state.seats.insert(seat.id, seat);
        }
        state
    }

    #[test]
    fn reserve_free_seat_by_position() {
        ReducerTest::new(SeatReducer::new())
            .with_env(env())
            .given_state(state_with(&[(1, "1A", false), (2, "1B", false)]))
            .when_action(SeatAction::ReserveSeat {
                seat: SeatRef::position(train(), "1A"),
            })
            .then_state(|state| {
                let seat = &state.seats[&SeatId::new(1)];
                assert!(seat.reserved);
                assert_eq!(seat.reserved_at, Some(test_clock().now()));
                assert!(!state.seats[&SeatId::new(2)].reserved);
                assert!(matches!(state.last_outcome, Some(Ok(_))));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn reserve_taken_seat_conflicts() {
        ReducerTest::new(SeatReducer::new())
            .with_env(env())
            .given_state(state_with(&[(1, "1A", true)]))
            .when_action(SeatAction::ReserveSeat {
                seat: SeatRef::Id(SeatId::new(1)),
            })
            .then_state(|state| {
                assert_eq!(
                    state.last_outcome,
                    Some(Err(ReservationError::Conflict(
                        ConflictKind::SeatAlreadyReserved
                    )))
                );
            })
            .run();
    }

    #[test]
    fn reserve_unknown_seat_is_not_found() {
        ReducerTest::new(SeatReducer::new())
            .with_env(env())
            .given_state(state_with(&[(1, "1A", false)]))
            .when_action(SeatAction::ReserveSeat {
                seat: SeatRef::position(train(), "9Z"),
            })
            .then_state(|state| {
                assert_eq!(
                    state.last_outcome,
                    Some(Err(ReservationError::NotFound(Entity::Seat)))
                );
            })
            .run();
    }

    #[test]
    fn cancel_free_seat_conflicts() {
        ReducerTest::new(SeatReducer::new())
            .with_env(env())
            .given_state(state_with(&[(1, "1A", false)]))
            .when_action(SeatAction::CancelSeat {
                seat: SeatRef::Id(SeatId::new(1)),
            })
            .then_state(|state| {
                assert_eq!(
                    state.last_outcome,
                    Some(Err(ReservationError::Conflict(ConflictKind::SeatNotReserved)))
                );
            })
            .run();
    }

    #[test]
    fn cancel_reserved_seat_clears_flag() {
        ReducerTest::new(SeatReducer::new())
            .with_env(env())
            .given_state(state_with(&[(1, "1A", true)]))
            .when_action(SeatAction::CancelSeat {
                seat: SeatRef::position(train(), "1A"),
            })
            .then_state(|state| {
                assert!(!state.seats[&SeatId::new(1)].reserved);
            })
            .run();
    }

    #[test]
    fn duplicate_position_is_rejected() {
        ReducerTest::new(SeatReducer::new())
            .with_env(env())
            .given_state(state_with(&[(1, "1A", false)]))
            .when_action(SeatAction::RegisterSeat {
                id: SeatId::new(2),
                train_id: train(),
                seat_number: "1A".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.seats.len(), 1);
                assert!(matches!(
                    state.last_outcome,
                    Some(Err(ReservationError::InvalidInput(_)))
                ));
            })
            .run();
    }

    #[test]
    fn by_train_is_ordered_and_filtered() {
        let mut state = state_with(&[(2, "1B", false), (1, "1A", false)]);
        state
            .seats
            .insert(SeatId::new(3), Seat::new(SeatId::new(3), TrainId::new(200), "1A"));

        let numbers: Vec<String> = state
            .by_train(train())
            .into_iter()
            .map(|s| s.seat_number)
            .collect();
        assert_eq!(numbers, vec!["1A", "1B"]);
        assert!(state.by_train(TrainId::new(999)).is_empty());
    }
}
